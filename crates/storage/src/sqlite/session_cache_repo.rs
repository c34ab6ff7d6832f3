use chrono::Utc;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{SessionCacheRepository, StorageError};

#[async_trait::async_trait]
impl SessionCacheRepository for SqliteRepository {
    async fn save_snapshot(&self, key: &str, snapshot: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO session_snapshots (key, snapshot, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    snapshot = excluded.snapshot,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(snapshot)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn load_snapshot(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT snapshot
                FROM session_snapshots
                WHERE key = ?1
            ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|r| {
            r.try_get("snapshot")
                .map_err(|e| StorageError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn clear_snapshot(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM session_snapshots WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}
