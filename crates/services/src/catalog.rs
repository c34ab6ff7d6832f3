use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use quizz_core::model::{Question, QuestionId, Quiz, QuizId};

use crate::error::CatalogError;

/// Content location of the deployed frontend, used when no override is set
/// and the environment declares itself production.
pub const PRODUCTION_CONTENT_URL: &str = "https://frontend-quizz-app-five.vercel.app";

/// Content location of the local dev server.
pub const DEV_CONTENT_URL: &str = "http://localhost:3000";

/// A source of the quiz catalog.
///
/// One fetch yields one immutable snapshot of every available quiz; callers
/// decide when to refresh.
#[async_trait]
pub trait QuizSource: Send + Sync {
    /// Fetch the full quiz catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the document cannot be fetched, decoded, or
    /// validated into domain quizzes.
    async fn fetch_catalog(&self) -> Result<Vec<Quiz>, CatalogError>;
}

/// HTTP catalog source reading `<base>/data.json` from the content provider.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
}

impl HttpCatalog {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Resolve the content base URL from the environment.
    ///
    /// `QUIZZ_CONTENT_URL` wins when set; otherwise `QUIZZ_ENV=production`
    /// selects the deployed location and anything else the local dev server.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var("QUIZZ_CONTENT_URL").unwrap_or_else(|_| {
            match env::var("QUIZZ_ENV").as_deref() {
                Ok("production") => PRODUCTION_CONTENT_URL.into(),
                _ => DEV_CONTENT_URL.into(),
            }
        });
        Self::new(base_url)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl QuizSource for HttpCatalog {
    async fn fetch_catalog(&self) -> Result<Vec<Quiz>, CatalogError> {
        let url = format!("{}/data.json", self.base_url.trim_end_matches('/'));

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(CatalogError::HttpStatus(response.status()));
        }

        let document: CatalogDocument = response.json().await?;
        document.into_quizzes()
    }
}

/// Canned catalog for tests and offline runs.
pub struct FixedCatalog {
    quizzes: Vec<Quiz>,
}

impl FixedCatalog {
    #[must_use]
    pub fn new(quizzes: Vec<Quiz>) -> Self {
        Self { quizzes }
    }
}

#[async_trait]
impl QuizSource for FixedCatalog {
    async fn fetch_catalog(&self) -> Result<Vec<Quiz>, CatalogError> {
        Ok(self.quizzes.clone())
    }
}

//
// ─── WIRE FORMAT ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    quizzes: Vec<QuizDoc>,
}

#[derive(Debug, Deserialize)]
struct QuizDoc {
    id: u64,
    title: String,
    icon: String,
    questions: Vec<QuestionDoc>,
}

#[derive(Debug, Deserialize)]
struct QuestionDoc {
    id: u64,
    question: String,
    answers: Vec<String>,
    answer: String,
}

impl CatalogDocument {
    fn into_quizzes(self) -> Result<Vec<Quiz>, CatalogError> {
        let mut quizzes = Vec::with_capacity(self.quizzes.len());
        for quiz in self.quizzes {
            let mut questions = Vec::with_capacity(quiz.questions.len());
            for q in quiz.questions {
                questions.push(Question::new(
                    QuestionId::new(q.id),
                    q.question,
                    q.answers,
                    q.answer,
                )?);
            }
            quizzes.push(Quiz::new(QuizId::new(quiz.id), quiz.title, quiz.icon, questions)?);
        }
        Ok(quizzes)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use quizz_core::model::QuizError;

    const DOCUMENT: &str = r#"
    {
        "quizzes": [
            {
                "id": 1,
                "title": "HTML",
                "icon": "/icons/html.svg",
                "questions": [
                    {
                        "id": 1,
                        "question": "What does HTML stand for?",
                        "answers": [
                            "Hyper Text Markup Language",
                            "Home Tool Markup Language",
                            "Hyperlinks and Text Markup Language",
                            "Hyper Tool Multi Language"
                        ],
                        "answer": "Hyper Text Markup Language"
                    },
                    {
                        "id": 2,
                        "question": "Which element holds metadata?",
                        "answers": ["<head>", "<body>", "<meta>", "<header>"],
                        "answer": "<head>"
                    }
                ]
            }
        ]
    }
    "#;

    #[test]
    fn document_decodes_into_validated_quizzes() {
        let document: CatalogDocument = serde_json::from_str(DOCUMENT).unwrap();
        let quizzes = document.into_quizzes().unwrap();

        assert_eq!(quizzes.len(), 1);
        let quiz = &quizzes[0];
        assert_eq!(quiz.id(), QuizId::new(1));
        assert_eq!(quiz.title(), "HTML");
        assert_eq!(quiz.icon(), "/icons/html.svg");
        assert_eq!(quiz.questions().len(), 2);

        let question = &quiz.questions()[0];
        assert_eq!(question.prompt(), "What does HTML stand for?");
        assert_eq!(question.choices().len(), 4);
        assert_eq!(question.answer(), "Hyper Text Markup Language");
        assert!(!question.is_answered());
    }

    #[test]
    fn document_with_bad_answer_key_is_rejected() {
        let raw = r#"
        {
            "quizzes": [
                {
                    "id": 1,
                    "title": "CSS",
                    "icon": "/icons/css.svg",
                    "questions": [
                        {
                            "id": 1,
                            "question": "Pick one",
                            "answers": ["a", "b"],
                            "answer": "z"
                        }
                    ]
                }
            ]
        }
        "#;
        let document: CatalogDocument = serde_json::from_str(raw).unwrap();
        let err = document.into_quizzes().unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Quiz(QuizError::AnswerNotInChoices)
        ));
    }

    #[tokio::test]
    async fn fixed_catalog_returns_its_quizzes() {
        let document: CatalogDocument = serde_json::from_str(DOCUMENT).unwrap();
        let quizzes = document.into_quizzes().unwrap();
        let source = FixedCatalog::new(quizzes.clone());

        let fetched = source.fetch_catalog().await.unwrap();
        assert_eq!(fetched, quizzes);
    }
}
