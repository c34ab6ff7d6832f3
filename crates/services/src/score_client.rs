use std::env;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use quizz_core::model::{QuizId, ScoreCard, UserId};
use storage::repository::{ScoreRepository, StorageError};

#[derive(Clone, Debug)]
pub struct ScoreStoreConfig {
    pub base_url: String,
    pub api_key: String,
}

impl ScoreStoreConfig {
    /// Reads `QUIZZ_SCORE_URL` / `QUIZZ_SCORE_API_KEY`; returns `None` when
    /// no remote score store is configured.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("QUIZZ_SCORE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = env::var("QUIZZ_SCORE_API_KEY").unwrap_or_default();
        Some(Self { base_url, api_key })
    }
}

/// Remote score store client against a PostgREST-style API.
///
/// Writes carry `on_conflict=user_id,quiz_id` and
/// `Prefer: resolution=merge-duplicates`, so the store replaces the row for
/// that key instead of erroring on conflict; repeated completions stay
/// idempotent.
pub struct HttpScoreStore {
    client: Client,
    config: ScoreStoreConfig,
}

impl HttpScoreStore {
    #[must_use]
    pub fn new(config: ScoreStoreConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn table_url(&self, query: &str) -> String {
        format!(
            "{}/rest/v1/quiz_scores?{query}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn conn(e: reqwest::Error) -> StorageError {
        StorageError::Connection(e.to_string())
    }
}

#[async_trait::async_trait]
impl ScoreRepository for HttpScoreStore {
    async fn upsert_score(&self, score: &ScoreCard) -> Result<(), StorageError> {
        let response = self
            .client
            .post(self.table_url("on_conflict=user_id,quiz_id"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&ScoreRow::from_card(score))
            .send()
            .await
            .map_err(Self::conn)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == reqwest::StatusCode::CONFLICT {
            Err(StorageError::Conflict)
        } else {
            Err(StorageError::Connection(format!(
                "score store returned status {status}"
            )))
        }
    }

    async fn get_score(
        &self,
        user_id: &UserId,
        quiz_id: QuizId,
    ) -> Result<Option<ScoreCard>, StorageError> {
        let query = format!(
            "user_id=eq.{}&quiz_id=eq.{}",
            user_id.as_str(),
            quiz_id.value()
        );
        let response = self
            .client
            .get(self.table_url(&query))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(Self::conn)?;

        if !response.status().is_success() {
            return Err(StorageError::Connection(format!(
                "score store returned status {}",
                response.status()
            )));
        }

        let rows: Vec<ScoreRow> = response.json().await.map_err(Self::conn)?;
        rows.into_iter().next().map(ScoreRow::into_card).transpose()
    }

    async fn list_scores(&self, user_id: &UserId) -> Result<Vec<ScoreCard>, StorageError> {
        let query = format!("user_id=eq.{}&order=completed_at.desc", user_id.as_str());
        let response = self
            .client
            .get(self.table_url(&query))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(Self::conn)?;

        if !response.status().is_success() {
            return Err(StorageError::Connection(format!(
                "score store returned status {}",
                response.status()
            )));
        }

        let rows: Vec<ScoreRow> = response.json().await.map_err(Self::conn)?;
        rows.into_iter().map(ScoreRow::into_card).collect()
    }
}

//
// ─── WIRE FORMAT ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize, Deserialize)]
struct ScoreRow {
    user_id: String,
    quiz_id: u64,
    quiz_title: String,
    score: u32,
    max_score: u32,
    completed_at: DateTime<Utc>,
}

impl ScoreRow {
    fn from_card(card: &ScoreCard) -> Self {
        Self {
            user_id: card.user_id().as_str().to_owned(),
            quiz_id: card.quiz_id().value(),
            quiz_title: card.quiz_title().to_owned(),
            score: card.score(),
            max_score: card.max_score(),
            completed_at: card.completed_at(),
        }
    }

    fn into_card(self) -> Result<ScoreCard, StorageError> {
        ScoreCard::new(
            UserId::new(self.user_id),
            QuizId::new(self.quiz_id),
            self.quiz_title,
            self.score,
            self.max_score,
            self.completed_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}
