use chrono::{DateTime, Utc};
use quizz_core::model::{QuizId, ScoreCard, UserId};
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{ScoreRepository, StorageError};

fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn map_score_row(row: &sqlx::sqlite::SqliteRow) -> Result<ScoreCard, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let quiz_id: i64 = row.try_get("quiz_id").map_err(ser)?;
    let quiz_id = u64::try_from(quiz_id)
        .map_err(|_| StorageError::Serialization(format!("invalid quiz_id: {quiz_id}")))?;
    let quiz_title: String = row.try_get("quiz_title").map_err(ser)?;
    let score = u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?;
    let max_score = u32_from_i64("max_score", row.try_get::<i64, _>("max_score").map_err(ser)?)?;
    let completed_at: DateTime<Utc> = row.try_get("completed_at").map_err(ser)?;

    ScoreCard::new(
        UserId::new(user_id),
        QuizId::new(quiz_id),
        quiz_title,
        score,
        max_score,
        completed_at,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl ScoreRepository for SqliteRepository {
    async fn upsert_score(&self, score: &ScoreCard) -> Result<(), StorageError> {
        let quiz_id = id_i64("quiz_id", score.quiz_id().value())?;

        sqlx::query(
            r"
                INSERT INTO quiz_scores (
                    user_id, quiz_id, quiz_title, score, max_score, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(user_id, quiz_id) DO UPDATE SET
                    quiz_title = excluded.quiz_title,
                    score = excluded.score,
                    max_score = excluded.max_score,
                    completed_at = excluded.completed_at
            ",
        )
        .bind(score.user_id().as_str())
        .bind(quiz_id)
        .bind(score.quiz_title())
        .bind(i64::from(score.score()))
        .bind(i64::from(score.max_score()))
        .bind(score.completed_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_score(
        &self,
        user_id: &UserId,
        quiz_id: QuizId,
    ) -> Result<Option<ScoreCard>, StorageError> {
        let quiz_id = id_i64("quiz_id", quiz_id.value())?;

        let row = sqlx::query(
            r"
                SELECT user_id, quiz_id, quiz_title, score, max_score, completed_at
                FROM quiz_scores
                WHERE user_id = ?1 AND quiz_id = ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_score_row).transpose()
    }

    async fn list_scores(&self, user_id: &UserId) -> Result<Vec<ScoreCard>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT user_id, quiz_id, quiz_title, score, max_score, completed_at
                FROM quiz_scores
                WHERE user_id = ?1
                ORDER BY completed_at DESC, quiz_id ASC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_score_row(&row)?);
        }

        Ok(out)
    }
}
