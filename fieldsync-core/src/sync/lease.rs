//! Single-flight guard for sync passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide "sync in progress" flag.
///
/// The flag is never persisted, so a restarted process always starts with
/// it cleared.
#[derive(Debug, Clone, Default)]
pub struct SyncGuard {
    in_progress: Arc<AtomicBool>,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lease if no other pass holds it.
    pub fn try_acquire(&self) -> Option<SyncLease> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncLease {
                in_progress: Arc::clone(&self.in_progress),
            })
    }

    pub fn is_held(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub(crate) fn issued(&self, lease: &SyncLease) -> bool {
        Arc::ptr_eq(&self.in_progress, &lease.in_progress)
    }
}

/// Proof that the holder is the only sync pass running.
///
/// Released when dropped, including on early return and unwinding.
#[must_use = "the lease is released as soon as it is dropped"]
#[derive(Debug)]
pub struct SyncLease {
    in_progress: Arc<AtomicBool>,
}

impl Drop for SyncLease {
    fn drop(&mut self) {
        self.in_progress.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let guard = SyncGuard::new();
        let lease = guard.try_acquire().unwrap();
        assert!(guard.is_held());
        assert!(guard.try_acquire().is_none());

        drop(lease);
        assert!(!guard.is_held());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_lease_released_on_panic() {
        let guard = SyncGuard::new();
        let cloned = guard.clone();

        let result = std::panic::catch_unwind(move || {
            let _lease = cloned.try_acquire().unwrap();
            panic!("sync blew up");
        });

        assert!(result.is_err());
        assert!(!guard.is_held());
    }

    #[test]
    fn test_issued_by() {
        let guard = SyncGuard::new();
        let other = SyncGuard::new();
        let lease = guard.try_acquire().unwrap();
        assert!(guard.issued(&lease));
        assert!(!other.issued(&lease));
    }
}
