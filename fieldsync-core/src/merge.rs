//! Unified view over queued and cached records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::cache::CacheEntry;
use crate::models::{Identity, RecordPayload, RecordType};
use crate::queue::{QueueEntry, QueueStatus};

/// Where a merged record was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    Remote,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local => write!(f, "local"),
            Origin::Remote => write!(f, "remote"),
        }
    }
}

/// One record as consumers see it, whether it lives in the queue, the
/// cache, or both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalRecord {
    pub identity: Identity,
    pub origin: Origin,
    pub record_type: RecordType,
    pub payload: RecordPayload,
    pub created_at: DateTime<Utc>,
    /// Queue state for local records; `None` once the record is remote.
    pub queue_status: Option<QueueStatus>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl LogicalRecord {
    fn from_queue(entry: QueueEntry) -> Self {
        let identity = match entry.payload.remote_id() {
            Some(id) => Identity::Remote(id.to_string()),
            None => Identity::Local(entry.id),
        };

        Self {
            identity,
            origin: Origin::Local,
            record_type: entry.record_type,
            created_at: entry.payload.created_at().unwrap_or(entry.created_at),
            payload: entry.payload,
            queue_status: Some(entry.status),
            retry_count: entry.retry_count,
            last_error: entry.last_error,
        }
    }

    fn from_cache(entry: CacheEntry) -> Self {
        Self {
            identity: Identity::Remote(entry.remote_id),
            origin: Origin::Remote,
            record_type: entry.record_type,
            created_at: entry.data.created_at().unwrap_or(entry.updated_at),
            payload: entry.data,
            queue_status: None,
            retry_count: 0,
            last_error: None,
        }
    }
}

/// Merges queued and cached records into one list, newest first.
///
/// A queued record whose payload already carries a remote id that is also
/// cached is dropped in favor of the cached copy.
pub fn merge_records(queued: Vec<QueueEntry>, cached: Vec<CacheEntry>) -> Vec<LogicalRecord> {
    let mut by_identity: HashMap<Identity, LogicalRecord> =
        HashMap::with_capacity(queued.len() + cached.len());

    for entry in queued {
        let record = LogicalRecord::from_queue(entry);
        by_identity.insert(record.identity.clone(), record);
    }
    for entry in cached {
        let record = LogicalRecord::from_cache(entry);
        by_identity.insert(record.identity.clone(), record);
    }

    let mut records: Vec<LogicalRecord> = by_identity.into_values().collect();
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.identity.to_string().cmp(&b.identity.to_string()))
    });
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BirthRecord;
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    fn payload(mother: &str) -> RecordPayload {
        let dob = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        BirthRecord::new(mother, dob, "agent-7").into()
    }

    fn queued(payload: RecordPayload, created_at: DateTime<Utc>) -> QueueEntry {
        QueueEntry {
            id: Uuid::new_v4(),
            record_type: RecordType::Birth,
            payload,
            status: QueueStatus::Pending,
            retry_count: 0,
            last_error: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn cached(remote_id: &str, created_at: DateTime<Utc>) -> CacheEntry {
        CacheEntry {
            record_type: RecordType::Birth,
            remote_id: remote_id.to_string(),
            data: payload("Amina")
                .prepare_for_upload(created_at)
                .with_remote_id(remote_id),
            synced_at: created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_local_only_record_uses_queue_id() {
        let entry = queued(payload("Amina"), Utc::now());
        let id = entry.id;

        let merged = merge_records(vec![entry], vec![]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].identity, Identity::Local(id));
        assert_eq!(merged[0].origin, Origin::Local);
        assert_eq!(merged[0].queue_status, Some(QueueStatus::Pending));
    }

    #[test]
    fn test_remote_wins_over_queued_copy_with_same_id() {
        let now = Utc::now();
        let entry = queued(payload("Amina").with_remote_id("X"), now);

        let merged = merge_records(vec![entry], vec![cached("X", now)]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].identity, Identity::Remote("X".to_string()));
        assert_eq!(merged[0].origin, Origin::Remote);
        assert_eq!(merged[0].queue_status, None);
    }

    #[test]
    fn test_distinct_records_are_all_kept_newest_first() {
        let now = Utc::now();
        let old = queued(payload("Old"), now - Duration::hours(2));
        let new = queued(payload("New"), now);

        let merged = merge_records(vec![old, new], vec![cached("R1", now - Duration::hours(1))]);

        let mothers: Vec<&str> = merged
            .iter()
            .map(|r| match &r.payload {
                RecordPayload::Birth(b) => b.mother_name.as_str(),
                RecordPayload::Pregnancy(p) => p.mother_name.as_str(),
            })
            .collect();
        assert_eq!(mothers, vec!["New", "Amina", "Old"]);
    }

    #[test]
    fn test_failed_entry_keeps_error_details() {
        let mut entry = queued(payload("Amina"), Utc::now());
        entry.status = QueueStatus::Failed;
        entry.retry_count = 2;
        entry.last_error = Some("503".to_string());

        let merged = merge_records(vec![entry], vec![]);

        assert_eq!(merged[0].retry_count, 2);
        assert_eq!(merged[0].last_error.as_deref(), Some("503"));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge_records(vec![], vec![]).is_empty());
    }
}
