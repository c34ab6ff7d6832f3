//! Shared error types for the services crate.

use thiserror::Error;

use quizz_core::model::{QuizError, ScoreCardError, SessionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by quiz catalog sources.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("content provider returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

/// Errors emitted by `QuizSessionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionServiceError {
    #[error("session state lock poisoned")]
    StatePoisoned,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Score(#[from] ScoreCardError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
