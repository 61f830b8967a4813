use std::time::Duration;

use crate::remote::DEFAULT_TIMEOUT;

/// Default number of queue entries pushed per sync pass.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Default number of failed pushes after which an entry needs attention.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default age after which a `Syncing` claim is considered abandoned.
/// Twice the remote request timeout, so a live push always finishes first.
pub const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(DEFAULT_TIMEOUT.as_secs() * 2);

/// Tunables for the sync engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Upper bound on entries pushed (and deleted from the queue) per pass.
    pub batch_size: usize,
    /// Failed pushes allowed before an entry stops being retried.
    pub max_retries: u32,
    /// Interval for background syncs, if any.
    pub auto_sync_interval: Option<Duration>,
    /// Claims older than this are released on open; younger ones belong to
    /// a push that may still be running in another process.
    pub claim_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            auto_sync_interval: None,
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
        }
    }
}

impl SyncSettings {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_auto_sync_interval(mut self, interval: Duration) -> Self {
        self.auto_sync_interval = Some(interval);
        self
    }

    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = timeout;
        self
    }
}
