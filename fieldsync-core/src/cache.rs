//! Local mirror of the remote collections, used for offline reads.
//!
//! Only the sync orchestrator writes here. Rows are replaced wholesale on
//! every pull; nothing in this module talks to the network.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::str::FromStr;

use crate::db::{format_timestamp, now, parse_timestamp};
use crate::error::SyncError;
use crate::models::{RecordPayload, RecordType};

const TABLE: &str = "record_cache";

/// Cached copy of one remote document.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub record_type: RecordType,
    pub remote_id: String,
    pub data: RecordPayload,
    pub synced_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CacheRow {
    record_type: String,
    remote_id: String,
    data: String,
    synced_at: String,
    updated_at: String,
}

impl TryFrom<CacheRow> for CacheEntry {
    type Error = SyncError;

    fn try_from(row: CacheRow) -> Result<Self, Self::Error> {
        Ok(CacheEntry {
            record_type: RecordType::from_str(&row.record_type)
                .map_err(|reason| SyncError::CorruptRow { table: TABLE, reason })?,
            data: RecordPayload::decode(&row.data)?,
            synced_at: parse_timestamp(TABLE, &row.synced_at)?,
            updated_at: parse_timestamp(TABLE, &row.updated_at)?,
            remote_id: row.remote_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RecordCache {
    pool: SqlitePool,
}

impl RecordCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts or overwrites the cached copy of a remote document.
    pub async fn upsert(
        &self,
        record_type: RecordType,
        remote_id: &str,
        data: &RecordPayload,
        updated_at: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        sqlx::query(
            r#"
            INSERT INTO record_cache (record_type, remote_id, data, synced_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (record_type, remote_id) DO UPDATE SET
                data = excluded.data,
                synced_at = excluded.synced_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record_type.as_str())
        .bind(remote_id)
        .bind(data.encode()?)
        .bind(format_timestamp(now()))
        .bind(format_timestamp(updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        record_type: RecordType,
        remote_id: &str,
    ) -> Result<Option<CacheEntry>, SyncError> {
        let row: Option<CacheRow> = sqlx::query_as(
            "SELECT * FROM record_cache WHERE record_type = ? AND remote_id = ?",
        )
        .bind(record_type.as_str())
        .bind(remote_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CacheEntry::try_from).transpose()
    }

    pub async fn list_all(&self, record_type: RecordType) -> Result<Vec<CacheEntry>, SyncError> {
        let rows: Vec<CacheRow> = sqlx::query_as(
            "SELECT * FROM record_cache WHERE record_type = ? ORDER BY remote_id",
        )
        .bind(record_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CacheEntry::try_from).collect()
    }

    /// Removes every cached document of `record_type` whose id is not in
    /// `keep_ids`. Returns the number of rows removed.
    pub async fn delete_where_id_not_in(
        &self,
        record_type: RecordType,
        keep_ids: &HashSet<String>,
    ) -> Result<u64, SyncError> {
        let mut tx = self.pool.begin().await?;

        let cached: Vec<(String,)> =
            sqlx::query_as("SELECT remote_id FROM record_cache WHERE record_type = ?")
                .bind(record_type.as_str())
                .fetch_all(&mut *tx)
                .await?;

        let mut removed = 0;
        for (remote_id,) in cached {
            if keep_ids.contains(&remote_id) {
                continue;
            }
            let result =
                sqlx::query("DELETE FROM record_cache WHERE record_type = ? AND remote_id = ?")
                    .bind(record_type.as_str())
                    .bind(&remote_id)
                    .execute(&mut *tx)
                    .await?;
            removed += result.rows_affected();
        }

        tx.commit().await?;
        Ok(removed)
    }

    pub async fn delete(&self, record_type: RecordType, remote_id: &str) -> Result<bool, SyncError> {
        let result = sqlx::query("DELETE FROM record_cache WHERE record_type = ? AND remote_id = ?")
            .bind(record_type.as_str())
            .bind(remote_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Empties the cache for every record type.
    pub async fn clear(&self) -> Result<u64, SyncError> {
        let result = sqlx::query("DELETE FROM record_cache")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::{BirthRecord, PregnancyRecord};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    struct TestContext {
        cache: RecordCache,
        _temp_dir: TempDir,
    }

    async fn setup() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        TestContext {
            cache: RecordCache::new(pool),
            _temp_dir: temp_dir,
        }
    }

    fn birth(mother: &str, remote_id: &str) -> RecordPayload {
        let dob = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        RecordPayload::from(BirthRecord::new(mother, dob, "agent-7")).with_remote_id(remote_id)
    }

    fn ids(entries: &[CacheEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.remote_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_overwrites() {
        let ctx = setup().await;
        let ts = now();

        ctx.cache
            .upsert(RecordType::Birth, "A", &birth("Amina", "A"), ts)
            .await
            .unwrap();
        ctx.cache
            .upsert(RecordType::Birth, "A", &birth("Zawadi", "A"), ts)
            .await
            .unwrap();

        let entries = ctx.cache.list_all(RecordType::Birth).await.unwrap();
        assert_eq!(entries.len(), 1);
        match &entries[0].data {
            RecordPayload::Birth(b) => assert_eq!(b.mother_name, "Zawadi"),
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(entries[0].updated_at, ts);
    }

    #[tokio::test]
    async fn test_types_are_isolated() {
        let ctx = setup().await;
        let pregnancy = RecordPayload::from(PregnancyRecord::new("Amina", "Kisoro", "agent-7"))
            .with_remote_id("P1");

        ctx.cache
            .upsert(RecordType::Pregnancy, "P1", &pregnancy, now())
            .await
            .unwrap();
        ctx.cache
            .upsert(RecordType::Birth, "B1", &birth("Amina", "B1"), now())
            .await
            .unwrap();

        assert_eq!(ids(&ctx.cache.list_all(RecordType::Pregnancy).await.unwrap()), vec!["P1"]);
        assert_eq!(ids(&ctx.cache.list_all(RecordType::Birth).await.unwrap()), vec!["B1"]);
    }

    #[tokio::test]
    async fn test_delete_where_id_not_in_prunes() {
        let ctx = setup().await;
        for id in ["A", "B", "C"] {
            ctx.cache
                .upsert(RecordType::Birth, id, &birth("Amina", id), now())
                .await
                .unwrap();
        }

        let keep: HashSet<String> = ["A", "C"].iter().map(|s| s.to_string()).collect();
        let removed = ctx
            .cache
            .delete_where_id_not_in(RecordType::Birth, &keep)
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(ids(&ctx.cache.list_all(RecordType::Birth).await.unwrap()), vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_delete_where_id_not_in_empty_set_clears_type() {
        let ctx = setup().await;
        ctx.cache
            .upsert(RecordType::Birth, "A", &birth("Amina", "A"), now())
            .await
            .unwrap();
        let pregnancy = RecordPayload::from(PregnancyRecord::new("Amina", "Kisoro", "agent-7"))
            .with_remote_id("P1");
        ctx.cache
            .upsert(RecordType::Pregnancy, "P1", &pregnancy, now())
            .await
            .unwrap();

        ctx.cache
            .delete_where_id_not_in(RecordType::Birth, &HashSet::new())
            .await
            .unwrap();

        assert!(ctx.cache.list_all(RecordType::Birth).await.unwrap().is_empty());
        assert_eq!(ctx.cache.list_all(RecordType::Pregnancy).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let ctx = setup().await;
        ctx.cache
            .upsert(RecordType::Birth, "A", &birth("Amina", "A"), now())
            .await
            .unwrap();
        ctx.cache
            .upsert(RecordType::Birth, "B", &birth("Amina", "B"), now())
            .await
            .unwrap();

        assert!(ctx.cache.delete(RecordType::Birth, "A").await.unwrap());
        assert!(!ctx.cache.delete(RecordType::Birth, "A").await.unwrap());
        assert!(ctx.cache.get(RecordType::Birth, "A").await.unwrap().is_none());

        assert_eq!(ctx.cache.clear().await.unwrap(), 1);
        assert!(ctx.cache.list_all(RecordType::Birth).await.unwrap().is_empty());
    }
}
