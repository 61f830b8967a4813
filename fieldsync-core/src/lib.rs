//! Fieldsync Core Library
//!
//! Offline-first capture and synchronization of field records: a durable
//! write queue, a local read cache, and the orchestrator that reconciles
//! both with a remote document store.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod engine;
pub mod error;
pub mod merge;
pub mod metadata;
pub mod models;
pub mod queue;
pub mod remote;
pub mod sync;

pub use cache::{CacheEntry, RecordCache};
pub use config::{SyncSettings, DEFAULT_BATCH_SIZE, DEFAULT_CLAIM_TIMEOUT, DEFAULT_MAX_RETRIES};
pub use connectivity::ConnectivityMonitor;
pub use db::init_db;
pub use engine::{DeleteReport, SyncEngine, SyncStatus};
pub use error::SyncError;
pub use merge::{merge_records, LogicalRecord, Origin};
pub use metadata::SyncMetadata;
pub use models::{
    BirthRecord, Identity, PregnancyRecord, RecordPayload, RecordType, Sex, ValidationStatus,
};
pub use queue::{PendingCounts, QueueEntry, QueueStatus, QueueStore};
pub use remote::{
    check_server, HttpRemoteStore, MemoryRemoteStore, RemoteDocument, RemoteError, RemoteStore,
};
pub use sync::{SyncOrchestrator, SyncOutcome, SyncReport, SyncTrigger};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
