//! Push/pull reconciliation between the local stores and the remote store.
//!
//! The orchestrator is the only component that talks to the remote store.
//! Every pass runs under a [`SyncLease`]; push and pull take the lease as a
//! parameter so they cannot be invoked outside a single-flight pass.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::lease::{SyncGuard, SyncLease};
use super::report::{
    FailedPush, PullReport, PushReport, PushedRecord, SyncOutcome, SyncReport, SyncTrigger,
};
use crate::cache::RecordCache;
use crate::config::SyncSettings;
use crate::connectivity::ConnectivityMonitor;
use crate::db::now;
use crate::error::SyncError;
use crate::metadata::SyncMetadata;
use crate::models::{RecordPayload, RecordType};
use crate::queue::{QueueEntry, QueueStatus, QueueStore};
use crate::remote::{merge_fields, RemoteStore};

pub struct SyncOrchestrator {
    queue: QueueStore,
    cache: RecordCache,
    metadata: SyncMetadata,
    remote: Arc<dyn RemoteStore>,
    connectivity: ConnectivityMonitor,
    guard: SyncGuard,
    batch_size: usize,
}

impl SyncOrchestrator {
    pub fn new(
        queue: QueueStore,
        cache: RecordCache,
        metadata: SyncMetadata,
        remote: Arc<dyn RemoteStore>,
        connectivity: ConnectivityMonitor,
        settings: &SyncSettings,
    ) -> Self {
        Self {
            queue,
            cache,
            metadata,
            remote,
            connectivity,
            guard: SyncGuard::new(),
            batch_size: settings.batch_size.max(1),
        }
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_held()
    }

    /// Takes the single-flight lease, if free.
    pub fn try_lease(&self) -> Option<SyncLease> {
        self.guard.try_acquire()
    }

    /// Push every eligible entry, then refresh every cached collection.
    ///
    /// Returns [`SyncOutcome::AlreadyRunning`] without doing anything when
    /// another pass holds the lease.
    pub async fn run_sync(&self) -> Result<SyncOutcome, SyncError> {
        self.run(SyncTrigger::Manual).await
    }

    pub async fn run(&self, trigger: SyncTrigger) -> Result<SyncOutcome, SyncError> {
        let Some(lease) = self.try_lease() else {
            debug!(%trigger, "sync already in progress, ignoring trigger");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        let started_at = now();
        info!(%trigger, "sync started");

        let push = self.push_pending(&lease).await?;

        let mut pulls = Vec::with_capacity(RecordType::ALL.len());
        for record_type in RecordType::ALL {
            pulls.push(self.pull_remote(&lease, record_type).await?);
        }

        let report = SyncReport {
            trigger,
            started_at,
            finished_at: now(),
            push,
            pulls,
        };

        info!(
            pushed = report.push.pushed.len(),
            failed = report.push.failed.len(),
            skipped = report.push.skipped,
            pull_errors = report.pulls.iter().filter(|p| p.error.is_some()).count(),
            "sync finished"
        );

        Ok(SyncOutcome::Completed(report))
    }

    /// Sends up to one batch of queued writes to the remote store, oldest
    /// first and one at a time.
    pub async fn push_pending(&self, lease: &SyncLease) -> Result<PushReport, SyncError> {
        debug_assert!(self.guard.issued(lease), "lease issued by another orchestrator");

        if !self.connectivity.is_online() {
            info!("offline, skipping push");
            return Ok(PushReport::offline());
        }

        let entries = self.queue.list_eligible(self.batch_size).await?;
        let mut report = PushReport::default();

        for entry in entries {
            let Some(claimed) = self.claim(&entry).await? else {
                debug!(id = %entry.id, "entry no longer claimable, skipping");
                report.skipped += 1;
                continue;
            };

            match self.push_entry(&claimed).await? {
                Ok(pushed) => report.pushed.push(pushed),
                Err(failed) => report.failed.push(failed),
            }
        }

        if !report.pushed.is_empty() {
            self.metadata.record_push(now()).await?;
        }

        Ok(report)
    }

    /// Re-reads, claims and re-verifies an entry. `None` means another
    /// runner got to it first or it disappeared.
    async fn claim(&self, listed: &QueueEntry) -> Result<Option<QueueEntry>, SyncError> {
        let current = match self.queue.get(listed.id).await? {
            Some(entry) if matches!(entry.status, QueueStatus::Pending | QueueStatus::Failed) => entry,
            _ => return Ok(None),
        };

        if !self.queue.mark_syncing(current.id).await? {
            return Ok(None);
        }

        match self.queue.get(current.id).await? {
            Some(entry) if entry.status == QueueStatus::Syncing => Ok(Some(entry)),
            _ => Ok(None),
        }
    }

    /// Pushes one claimed entry. The outer `Result` carries storage errors,
    /// the inner one the per-entry outcome.
    async fn push_entry(
        &self,
        entry: &QueueEntry,
    ) -> Result<Result<PushedRecord, FailedPush>, SyncError> {
        let upload = entry.payload.prepare_for_upload(entry.created_at);
        let collection = entry.record_type.collection();

        let created = match upload.to_document() {
            Ok(document) => self
                .remote
                .create(collection, document)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(format!("could not encode payload: {}", e)),
        };

        match created {
            Ok(remote_id) => {
                self.queue.mark_synced(entry.id).await?;
                let synced = upload.with_remote_id(remote_id.clone());
                self.cache
                    .upsert(entry.record_type, &remote_id, &synced, now())
                    .await?;

                debug!(id = %entry.id, %remote_id, record_type = %entry.record_type, "pushed");
                Ok(Ok(PushedRecord {
                    queue_id: entry.id,
                    record_type: entry.record_type,
                    remote_id,
                }))
            }
            Err(error) => {
                self.queue.mark_failed(entry.id, &error).await?;

                let retry_count = entry.retry_count + 1;
                let needs_attention = retry_count >= self.queue.max_retries();
                warn!(
                    id = %entry.id,
                    record_type = %entry.record_type,
                    retry_count,
                    needs_attention,
                    %error,
                    "push failed"
                );
                Ok(Err(FailedPush {
                    queue_id: entry.id,
                    record_type: entry.record_type,
                    error,
                    retry_count,
                    needs_attention,
                }))
            }
        }
    }

    /// Replaces the cached copy of one collection with the remote contents.
    ///
    /// A remote failure is reported in the returned [`PullReport`] and leaves
    /// the cache untouched; only local storage errors are returned as `Err`.
    pub async fn pull_remote(
        &self,
        lease: &SyncLease,
        record_type: RecordType,
    ) -> Result<PullReport, SyncError> {
        debug_assert!(self.guard.issued(lease), "lease issued by another orchestrator");

        if !self.connectivity.is_online() {
            info!(%record_type, "offline, skipping pull");
            return Ok(PullReport::offline(record_type));
        }

        let documents = match self.remote.list(record_type.collection()).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!(%record_type, error = %e, "pull failed");
                return Ok(PullReport::failed(record_type, e.to_string()));
            }
        };

        let mut report = PullReport::new(record_type);
        report.fetched = documents.len();

        let fetched_at = now();
        let mut keep_ids = HashSet::with_capacity(documents.len());
        for document in documents {
            keep_ids.insert(document.id.clone());
            match RecordPayload::from_document(record_type, &document.id, document.data) {
                Ok(payload) => {
                    self.cache
                        .upsert(record_type, &document.id, &payload, fetched_at)
                        .await?
                }
                Err(e) => {
                    warn!(%record_type, id = %document.id, error = %e, "skipping undecodable document");
                    report.undecodable += 1;
                }
            }
        }

        report.pruned = self.cache.delete_where_id_not_in(record_type, &keep_ids).await?;
        self.metadata.record_pull(record_type, now()).await?;

        debug!(%record_type, fetched = report.fetched, pruned = report.pruned, "pulled");
        Ok(report)
    }

    /// Best-effort remote delete. Returns whether the remote store
    /// confirmed it.
    pub async fn delete_remote(&self, record_type: RecordType, remote_id: &str) -> bool {
        if !self.connectivity.is_online() {
            debug!(%record_type, %remote_id, "offline, not deleting remotely");
            return false;
        }

        match self.remote.delete(record_type.collection(), remote_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%record_type, %remote_id, error = %e, "remote delete failed");
                false
            }
        }
    }

    /// Applies a partial update remotely and mirrors it into the cache.
    pub async fn update_remote(
        &self,
        record_type: RecordType,
        remote_id: &str,
        fields: Value,
    ) -> Result<(), SyncError> {
        if !self.connectivity.is_online() {
            return Err(SyncError::Offline);
        }

        self.remote
            .update(record_type.collection(), remote_id, fields.clone())
            .await?;

        if let Some(cached) = self.cache.get(record_type, remote_id).await? {
            let mut document = cached.data.to_document()?;
            merge_fields(&mut document, fields);
            let patched = RecordPayload::from_document(record_type, remote_id, document)?;
            self.cache
                .upsert(record_type, remote_id, &patched, now())
                .await?;
        }

        Ok(())
    }

    /// Runs a sync whenever connectivity comes back and, if `interval` is
    /// set, on every tick. Runs until the returned task is aborted.
    pub fn spawn_auto_sync(self: &Arc<Self>, interval: Option<Duration>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        let mut online_rx = self.connectivity.subscribe();
        let mut was_online = *online_rx.borrow_and_update();

        tokio::spawn(async move {
            let mut ticker = interval.map(|period| {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });

            loop {
                let trigger = tokio::select! {
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *online_rx.borrow_and_update();
                        let restored = online && !was_online;
                        was_online = online;
                        if !restored {
                            continue;
                        }
                        SyncTrigger::ConnectivityRestored
                    }
                    _ = next_tick(&mut ticker) => SyncTrigger::Interval,
                };

                match orchestrator.run(trigger).await {
                    Ok(SyncOutcome::Completed(report)) if report.has_failures() => {
                        warn!(%trigger, "background sync finished with failures")
                    }
                    Ok(_) => {}
                    Err(e) => warn!(%trigger, error = %e, "background sync aborted"),
                }
            }
        })
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
