#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod error;
pub mod identity;
pub mod score_client;
pub mod session_service;

pub use quizz_core::Clock;

pub use app_services::AppServices;
pub use catalog::{FixedCatalog, HttpCatalog, QuizSource};
pub use error::{AppServicesError, CatalogError, SessionServiceError};
pub use identity::{IdentityProvider, SharedIdentity, StaticIdentity};
pub use score_client::{HttpScoreStore, ScoreStoreConfig};
pub use session_service::{
    CompletionOutcome, QuizSessionService, SESSION_CACHE_KEY, SubmissionOutcome,
};
