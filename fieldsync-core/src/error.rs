//! Engine error types.

use thiserror::Error;
use uuid::Uuid;

use crate::remote::RemoteError;

/// Errors surfaced by the sync engine.
///
/// Storage failures are fatal to the operation that hit them. Remote
/// failures during a push are recorded on the queue entry instead of being
/// returned, so `Remote` only reaches callers of direct remote operations.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    #[error("Queue entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Queue entry {0} is being synced, try again once the current sync finishes")]
    EntryBusy(Uuid),

    #[error("Device is offline")]
    Offline,
}
