use std::sync::Arc;

use storage::repository::{ScoreRepository, Storage};

use crate::Clock;
use crate::catalog::QuizSource;
use crate::error::AppServicesError;
use crate::identity::IdentityProvider;
use crate::score_client::{HttpScoreStore, ScoreStoreConfig};
use crate::session_service::QuizSessionService;

/// Assembles app-facing services over a storage backend.
///
/// Scores go to the remote store when one is configured, and otherwise to
/// the same local backend that holds the session cache.
#[derive(Clone)]
pub struct AppServices {
    session: Arc<QuizSessionService>,
    scores: Arc<dyn ScoreRepository>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        catalog: Arc<dyn QuizSource>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, catalog, identity))
    }

    /// Build services over in-memory storage, for tests and ephemeral runs.
    #[must_use]
    pub fn in_memory(
        clock: Clock,
        catalog: Arc<dyn QuizSource>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self::from_storage(Storage::in_memory(), clock, catalog, identity)
    }

    fn from_storage(
        storage: Storage,
        clock: Clock,
        catalog: Arc<dyn QuizSource>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let scores: Arc<dyn ScoreRepository> = match ScoreStoreConfig::from_env() {
            Some(config) => Arc::new(HttpScoreStore::new(config)),
            None => Arc::clone(&storage.scores),
        };
        let session = Arc::new(QuizSessionService::new(
            clock,
            catalog,
            Arc::clone(&scores),
            Arc::clone(&storage.session_cache),
            identity,
        ));
        Self { session, scores }
    }

    #[must_use]
    pub fn session(&self) -> Arc<QuizSessionService> {
        Arc::clone(&self.session)
    }

    /// Score store for read-side views such as a profile page.
    #[must_use]
    pub fn scores(&self) -> Arc<dyn ScoreRepository> {
        Arc::clone(&self.scores)
    }
}
