use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use quizz_core::model::{QuizId, ScoreCard, UserId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for final quiz scores.
///
/// The `(user_id, quiz_id)` pair is the upsert key: writing a score for a
/// pair that already has a row replaces that row, so repeated completions of
/// the same quiz stay idempotent (latest attempt wins).
#[async_trait]
pub trait ScoreRepository: Send + Sync {
    /// Insert or replace the score row for `(user_id, quiz_id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write cannot be performed.
    async fn upsert_score(&self, score: &ScoreCard) -> Result<(), StorageError>;

    /// Fetch the stored score for one user+quiz pair, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on lookup failure; a missing row is `Ok(None)`.
    async fn get_score(
        &self,
        user_id: &UserId,
        quiz_id: QuizId,
    ) -> Result<Option<ScoreCard>, StorageError>;

    /// All stored scores for a user, most recently completed first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on lookup failure.
    async fn list_scores(&self, user_id: &UserId) -> Result<Vec<ScoreCard>, StorageError>;
}

/// Repository contract for the durable local session cache.
///
/// One serialized snapshot per logical key; the session engine writes the
/// whole session under a fixed key after every state transition and reads it
/// back at process start.
#[async_trait]
pub trait SessionCacheRepository: Send + Sync {
    /// Persist or replace the snapshot stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write cannot be performed.
    async fn save_snapshot(&self, key: &str, snapshot: &str) -> Result<(), StorageError>;

    /// Fetch the snapshot stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on lookup failure; a missing snapshot is
    /// `Ok(None)`.
    async fn load_snapshot(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove the snapshot stored under `key`. Removing a missing key is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete cannot be performed.
    async fn clear_snapshot(&self, key: &str) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    scores: Arc<Mutex<HashMap<(UserId, QuizId), ScoreCard>>>,
    snapshots: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreRepository for InMemoryRepository {
    async fn upsert_score(&self, score: &ScoreCard) -> Result<(), StorageError> {
        let mut guard = self
            .scores
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((score.user_id().clone(), score.quiz_id()), score.clone());
        Ok(())
    }

    async fn get_score(
        &self,
        user_id: &UserId,
        quiz_id: QuizId,
    ) -> Result<Option<ScoreCard>, StorageError> {
        let guard = self
            .scores
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(user_id.clone(), quiz_id)).cloned())
    }

    async fn list_scores(&self, user_id: &UserId) -> Result<Vec<ScoreCard>, StorageError> {
        let guard = self
            .scores
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut out: Vec<ScoreCard> = guard
            .values()
            .filter(|card| card.user_id() == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.completed_at().cmp(&a.completed_at()));
        Ok(out)
    }
}

#[async_trait]
impl SessionCacheRepository for InMemoryRepository {
    async fn save_snapshot(&self, key: &str, snapshot: &str) -> Result<(), StorageError> {
        let mut guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), snapshot.to_owned());
        Ok(())
    }

    async fn load_snapshot(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn clear_snapshot(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// Aggregates score and session-cache repositories behind trait objects for
/// easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub scores: Arc<dyn ScoreRepository>,
    pub session_cache: Arc<dyn SessionCacheRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let scores: Arc<dyn ScoreRepository> = Arc::new(repo.clone());
        let session_cache: Arc<dyn SessionCacheRepository> = Arc::new(repo);
        Self {
            scores,
            session_cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quizz_core::time::fixed_now;

    fn build_score(user: &str, quiz: u64, score: u32) -> ScoreCard {
        ScoreCard::new(
            UserId::new(user),
            QuizId::new(quiz),
            format!("Quiz {quiz}"),
            score,
            10,
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn upsert_replaces_the_row_for_the_same_key() {
        let repo = InMemoryRepository::new();
        let user = UserId::new("user-1");

        repo.upsert_score(&build_score("user-1", 1, 4)).await.unwrap();
        repo.upsert_score(&build_score("user-1", 1, 9)).await.unwrap();

        let stored = repo.get_score(&user, QuizId::new(1)).await.unwrap().unwrap();
        assert_eq!(stored.score(), 9);
        assert_eq!(repo.list_scores(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_score_returns_none_for_missing_pair() {
        let repo = InMemoryRepository::new();
        let found = repo
            .get_score(&UserId::new("nobody"), QuizId::new(7))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn list_scores_is_per_user_and_newest_first() {
        let repo = InMemoryRepository::new();
        let early = build_score("user-1", 1, 3);
        let late = ScoreCard::new(
            UserId::new("user-1"),
            QuizId::new(2),
            "Quiz 2",
            8,
            10,
            fixed_now() + Duration::hours(1),
        )
        .unwrap();
        repo.upsert_score(&early).await.unwrap();
        repo.upsert_score(&late).await.unwrap();
        repo.upsert_score(&build_score("user-2", 1, 5)).await.unwrap();

        let scores = repo.list_scores(&UserId::new("user-1")).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].quiz_id(), QuizId::new(2));
        assert_eq!(scores[1].quiz_id(), QuizId::new(1));
    }

    #[tokio::test]
    async fn snapshot_save_load_clear_round_trip() {
        let repo = InMemoryRepository::new();

        assert!(repo.load_snapshot("quizz").await.unwrap().is_none());
        repo.save_snapshot("quizz", r#"{"score":1}"#).await.unwrap();
        assert_eq!(
            repo.load_snapshot("quizz").await.unwrap().as_deref(),
            Some(r#"{"score":1}"#)
        );

        repo.save_snapshot("quizz", r#"{"score":2}"#).await.unwrap();
        assert_eq!(
            repo.load_snapshot("quizz").await.unwrap().as_deref(),
            Some(r#"{"score":2}"#)
        );

        repo.clear_snapshot("quizz").await.unwrap();
        assert!(repo.load_snapshot("quizz").await.unwrap().is_none());
    }
}
