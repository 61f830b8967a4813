//! Durable queue of locally created writes awaiting remote confirmation.
//!
//! Every mutation is a single SQL statement that is committed before the
//! call returns. The claim transition in [`QueueStore::mark_syncing`] is a
//! conditional `UPDATE`, so two runners can never both own an entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::db::{format_timestamp, now, parse_timestamp};
use crate::error::SyncError;
use crate::models::{RecordPayload, RecordType};

const TABLE: &str = "sync_queue";

/// Outstanding queue entries per record type.
pub type PendingCounts = BTreeMap<RecordType, u64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Syncing,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Syncing => "syncing",
            QueueStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "syncing" => Ok(QueueStatus::Syncing),
            "failed" => Ok(QueueStatus::Failed),
            _ => Err(format!("Invalid queue status '{}'", s)),
        }
    }
}

/// A locally created write not yet confirmed by the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub id: Uuid,
    pub record_type: RecordType,
    pub payload: RecordPayload,
    pub status: QueueStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Whether a push pass may pick this entry up.
    pub fn is_eligible(&self, max_retries: u32) -> bool {
        match self.status {
            QueueStatus::Pending => true,
            QueueStatus::Failed => self.retry_count < max_retries,
            QueueStatus::Syncing => false,
        }
    }

    /// Failed too many times to be retried automatically.
    pub fn needs_attention(&self, max_retries: u32) -> bool {
        self.status == QueueStatus::Failed && self.retry_count >= max_retries
    }
}

#[derive(sqlx::FromRow)]
struct QueueRow {
    id: String,
    record_type: String,
    payload: String,
    status: String,
    retry_count: i64,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<QueueRow> for QueueEntry {
    type Error = SyncError;

    fn try_from(row: QueueRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| SyncError::CorruptRow {
            table: TABLE,
            reason,
        };

        Ok(QueueEntry {
            id: Uuid::parse_str(&row.id).map_err(|e| corrupt(format!("bad id '{}': {}", row.id, e)))?,
            record_type: RecordType::from_str(&row.record_type).map_err(corrupt)?,
            payload: RecordPayload::decode(&row.payload)?,
            status: QueueStatus::from_str(&row.status).map_err(corrupt)?,
            retry_count: u32::try_from(row.retry_count)
                .map_err(|_| corrupt(format!("bad retry count {}", row.retry_count)))?,
            last_error: row.last_error,
            created_at: parse_timestamp(TABLE, &row.created_at)?,
            updated_at: parse_timestamp(TABLE, &row.updated_at)?,
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, record_type, payload, status, retry_count, last_error, created_at, updated_at FROM sync_queue";

#[derive(Debug, Clone)]
pub struct QueueStore {
    pool: SqlitePool,
    max_retries: u32,
}

impl QueueStore {
    pub fn new(pool: SqlitePool, max_retries: u32) -> Self {
        Self { pool, max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Persists a new `Pending` entry and returns it.
    pub async fn enqueue(&self, payload: &RecordPayload) -> Result<QueueEntry, SyncError> {
        let id = Uuid::new_v4();
        let created_at = now();
        let record_type = payload.record_type();

        sqlx::query(
            r#"
            INSERT INTO sync_queue (id, record_type, payload, status, retry_count, created_at, updated_at)
            VALUES (?, ?, ?, 'pending', 0, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(record_type.as_str())
        .bind(payload.encode()?)
        .bind(format_timestamp(created_at))
        .bind(format_timestamp(created_at))
        .execute(&self.pool)
        .await?;

        tracing::debug!(%id, %record_type, "enqueued record");

        Ok(QueueEntry {
            id,
            record_type,
            payload: payload.clone(),
            status: QueueStatus::Pending,
            retry_count: 0,
            last_error: None,
            created_at,
            updated_at: created_at,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<QueueEntry>, SyncError> {
        let row: Option<QueueRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(QueueEntry::try_from).transpose()
    }

    /// Oldest-first entries a push pass may claim, capped at `limit`.
    pub async fn list_eligible(&self, limit: usize) -> Result<Vec<QueueEntry>, SyncError> {
        let rows: Vec<QueueRow> = sqlx::query_as(&format!(
            "{} WHERE status = 'pending' OR (status = 'failed' AND retry_count < ?) \
             ORDER BY created_at ASC, seq ASC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(i64::from(self.max_retries))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(QueueEntry::try_from).collect()
    }

    /// Every entry of one type regardless of status, oldest first.
    pub async fn list_by_type(&self, record_type: RecordType) -> Result<Vec<QueueEntry>, SyncError> {
        let rows: Vec<QueueRow> = sqlx::query_as(&format!(
            "{} WHERE record_type = ? ORDER BY created_at ASC, seq ASC",
            SELECT_COLUMNS
        ))
        .bind(record_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(QueueEntry::try_from).collect()
    }

    /// Entries that exhausted their retries, optionally for one type.
    pub async fn list_needs_attention(
        &self,
        record_type: Option<RecordType>,
    ) -> Result<Vec<QueueEntry>, SyncError> {
        let rows: Vec<QueueRow> = sqlx::query_as(&format!(
            "{} WHERE status = 'failed' AND retry_count >= ? AND (? IS NULL OR record_type = ?) \
             ORDER BY created_at ASC, seq ASC",
            SELECT_COLUMNS
        ))
        .bind(i64::from(self.max_retries))
        .bind(record_type.map(|t| t.as_str()))
        .bind(record_type.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(QueueEntry::try_from).collect()
    }

    /// Claims an entry for the calling push pass.
    ///
    /// Returns `false` when the entry is missing or already `Syncing`.
    pub async fn mark_syncing(&self, id: Uuid) -> Result<bool, SyncError> {
        let result = sqlx::query(
            "UPDATE sync_queue SET status = 'syncing', updated_at = ? \
             WHERE id = ? AND status IN ('pending', 'failed')",
        )
        .bind(format_timestamp(now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Removes an entry the remote store has accepted.
    pub async fn mark_synced(&self, id: Uuid) -> Result<(), SyncError> {
        sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), SyncError> {
        sqlx::query(
            "UPDATE sync_queue SET status = 'failed', retry_count = retry_count + 1, \
             last_error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(error)
        .bind(format_timestamp(now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Number of entries still in the queue per type, failed ones included.
    pub async fn count(&self) -> Result<PendingCounts, SyncError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT record_type, COUNT(*) FROM sync_queue GROUP BY record_type")
                .fetch_all(&self.pool)
                .await?;

        let mut counts: PendingCounts = RecordType::ALL.iter().map(|t| (*t, 0)).collect();
        for (record_type, count) in rows {
            let record_type = RecordType::from_str(&record_type).map_err(|reason| {
                SyncError::CorruptRow {
                    table: TABLE,
                    reason,
                }
            })?;
            counts.insert(record_type, u64::try_from(count).unwrap_or(0));
        }
        Ok(counts)
    }

    /// Puts an entry back to `Pending` with a fresh retry budget.
    ///
    /// Returns `false` when the entry is missing or currently `Syncing`.
    pub async fn reset_for_retry(&self, id: Uuid) -> Result<bool, SyncError> {
        let result = sqlx::query(
            "UPDATE sync_queue SET status = 'pending', retry_count = 0, updated_at = ? \
             WHERE id = ? AND status != 'syncing'",
        )
        .bind(format_timestamp(now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Drops an entry that is not owned by a running push.
    pub async fn discard(&self, id: Uuid) -> Result<bool, SyncError> {
        let result = sqlx::query("DELETE FROM sync_queue WHERE id = ? AND status != 'syncing'")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Releases claims left behind by a process that stopped mid-push.
    ///
    /// Only claims not touched for at least `stale_after` are released; a
    /// younger claim may belong to a push still running in another process.
    pub async fn release_orphaned_claims(&self, stale_after: Duration) -> Result<u64, SyncError> {
        let Some(cutoff) = chrono::Duration::from_std(stale_after)
            .ok()
            .and_then(|age| now().checked_sub_signed(age))
        else {
            return Ok(0);
        };

        let result = sqlx::query(
            "UPDATE sync_queue \
             SET status = CASE WHEN retry_count = 0 THEN 'pending' ELSE 'failed' END, updated_at = ? \
             WHERE status = 'syncing' AND updated_at <= ?",
        )
        .bind(format_timestamp(now()))
        .bind(format_timestamp(cutoff))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
