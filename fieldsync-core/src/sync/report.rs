use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::RecordType;

/// What started a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Manual,
    ConnectivityRestored,
    Interval,
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncTrigger::Manual => write!(f, "manual"),
            SyncTrigger::ConnectivityRestored => write!(f, "connectivity restored"),
            SyncTrigger::Interval => write!(f, "interval"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushedRecord {
    pub queue_id: Uuid,
    pub record_type: RecordType,
    pub remote_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedPush {
    pub queue_id: Uuid,
    pub record_type: RecordType,
    pub error: String,
    pub retry_count: u32,
    /// Retries are exhausted; the entry waits for a manual decision.
    pub needs_attention: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushReport {
    /// The phase did nothing because the device was offline.
    pub offline: bool,
    pub pushed: Vec<PushedRecord>,
    pub failed: Vec<FailedPush>,
    /// Entries another runner claimed or removed between listing and claiming.
    pub skipped: usize,
}

impl PushReport {
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullReport {
    pub record_type: RecordType,
    pub offline: bool,
    /// Documents returned by the remote listing.
    pub fetched: usize,
    /// Cached documents removed because the remote no longer has them.
    pub pruned: u64,
    /// Documents that could not be decoded and were left as they were.
    pub undecodable: usize,
    pub error: Option<String>,
}

impl PullReport {
    pub fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            offline: false,
            fetched: 0,
            pruned: 0,
            undecodable: 0,
            error: None,
        }
    }

    pub fn offline(record_type: RecordType) -> Self {
        Self {
            offline: true,
            ..Self::new(record_type)
        }
    }

    pub fn failed(record_type: RecordType, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(record_type)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub trigger: SyncTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub push: PushReport,
    pub pulls: Vec<PullReport>,
}

impl SyncReport {
    /// True if any entry failed to push or any type failed to pull.
    pub fn has_failures(&self) -> bool {
        !self.push.failed.is_empty() || self.pulls.iter().any(|p| p.error.is_some())
    }
}

/// Result of asking for a sync pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass held the lease; this call did nothing.
    AlreadyRunning,
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::AlreadyRunning => None,
        }
    }
}
