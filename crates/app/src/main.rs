use std::fmt;
use std::sync::Arc;

use quizz_core::model::UserId;
use services::{AppServices, Clock, HttpCatalog, StaticIdentity};
use storage::repository::ScoreRepository;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    MissingUser,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::MissingUser => {
                write!(f, "scores needs a user: pass --user or set QUIZZ_USER_ID")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- status [--db <sqlite_url>] [--content-url <url>] [--user <id>]");
    eprintln!("  cargo run -p app -- scores [--db <sqlite_url>] [--user <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quizz.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZZ_DB_URL, QUIZZ_CONTENT_URL, QUIZZ_ENV, QUIZZ_USER_ID");
    eprintln!("  QUIZZ_SCORE_URL, QUIZZ_SCORE_API_KEY (remote score store)");
    eprintln!("  LOG_LEVEL (tracing filter, default info)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Status,
    Scores,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "status" => Some(Self::Status),
            "scores" => Some(Self::Scores),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    content_url: Option<String>,
    user_id: Option<UserId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZZ_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://quizz.sqlite3".into(), normalize_sqlite_url);
        let mut content_url = None;
        let mut user_id = std::env::var("QUIZZ_USER_ID")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(UserId::new);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--content-url" => {
                    content_url = Some(require_value(args, "--content-url")?);
                }
                "--user" => {
                    user_id = Some(UserId::new(require_value(args, "--user")?));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            content_url,
            user_id,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: show session status when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Status,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Status,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;

    let catalog = match &parsed.content_url {
        Some(url) => HttpCatalog::new(url.clone()),
        None => HttpCatalog::from_env(),
    };
    tracing::info!(content_url = catalog.base_url(), db_url = %parsed.db_url, "starting");

    let identity = match parsed.user_id.clone() {
        Some(user) => StaticIdentity::signed_in(user),
        None => StaticIdentity::anonymous(),
    };
    let app = AppServices::new_sqlite(
        &parsed.db_url,
        Clock::default_clock(),
        Arc::new(catalog),
        Arc::new(identity),
    )
    .await?;

    match cmd {
        Command::Status => {
            let session = app.session();
            let restored = session.rehydrate().await?;
            session.fetch_quizzes().await?;

            let state = session.state()?;
            println!("catalog: {} quizzes", state.quizzes().len());
            for quiz in state.quizzes() {
                println!(
                    "  [{}] {} ({} questions)",
                    quiz.id(),
                    quiz.title(),
                    quiz.questions().len()
                );
            }

            if !restored {
                println!("session: fresh");
                return Ok(());
            }
            match state.selected_quiz() {
                Some(quiz) if state.has_completed_all() => {
                    println!(
                        "session: completed \"{}\" with {}/{}",
                        quiz.title(),
                        state.score(),
                        state.max_score()
                    );
                    if let Some(failure) = state.score_error() {
                        println!("  score not saved: {failure}");
                    }
                }
                Some(quiz) => {
                    let answered = state
                        .questions()
                        .iter()
                        .filter(|q| q.is_answered())
                        .count();
                    println!(
                        "session: \"{}\" in progress, question {}/{}, {answered} answered",
                        quiz.title(),
                        state.current_question_index() + 1,
                        state.questions().len()
                    );
                }
                None => println!("session: idle"),
            }
            Ok(())
        }
        Command::Scores => {
            let user = parsed.user_id.ok_or(ArgsError::MissingUser)?;
            let scores = app.scores().list_scores(&user).await?;
            if scores.is_empty() {
                println!("no scores recorded for {}", user.as_str());
                return Ok(());
            }
            for card in scores {
                println!(
                    "{}  {}  {}/{}",
                    card.completed_at().format("%Y-%m-%d %H:%M"),
                    card.quiz_title(),
                    card.score(),
                    card.max_score()
                );
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
