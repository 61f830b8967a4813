use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::{format_timestamp, now, parse_timestamp};
use crate::error::SyncError;
use crate::models::RecordType;

const TABLE: &str = "sync_metadata";

/// Small key/value table for sync bookkeeping.
///
/// Timestamps kept here are informational; pulls always fetch whole
/// collections and never use them as a cursor.
#[derive(Debug, Clone)]
pub struct SyncMetadata {
    pool: SqlitePool,
}

impl SyncMetadata {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM sync_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        sqlx::query(
            r#"
            INSERT INTO sync_metadata (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(format_timestamp(now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_pull(&self, record_type: RecordType, at: DateTime<Utc>) -> Result<(), SyncError> {
        self.set(&pull_key(record_type), &format_timestamp(at)).await
    }

    pub async fn last_pull_at(&self, record_type: RecordType) -> Result<Option<DateTime<Utc>>, SyncError> {
        self.get_timestamp(&pull_key(record_type)).await
    }

    pub async fn record_push(&self, at: DateTime<Utc>) -> Result<(), SyncError> {
        self.set("last_push_at", &format_timestamp(at)).await
    }

    pub async fn last_push_at(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        self.get_timestamp("last_push_at").await
    }

    async fn get_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>, SyncError> {
        self.get(key)
            .await?
            .map(|raw| parse_timestamp(TABLE, &raw))
            .transpose()
    }
}

fn pull_key(record_type: RecordType) -> String {
    format!("last_pull_at:{}", record_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_pull_timestamps_per_type() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        let meta = SyncMetadata::new(pool);

        assert!(meta.last_pull_at(RecordType::Birth).await.unwrap().is_none());

        let ts = now();
        meta.record_pull(RecordType::Birth, ts).await.unwrap();

        assert_eq!(meta.last_pull_at(RecordType::Birth).await.unwrap(), Some(ts));
        assert!(meta.last_pull_at(RecordType::Pregnancy).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        let meta = SyncMetadata::new(pool);

        meta.set("device", "tablet-1").await.unwrap();
        meta.set("device", "tablet-2").await.unwrap();
        assert_eq!(meta.get("device").await.unwrap().as_deref(), Some("tablet-2"));
    }
}
