//! Application-facing entry point tying the stores and the orchestrator
//! together.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::RecordCache;
use crate::config::SyncSettings;
use crate::connectivity::ConnectivityMonitor;
use crate::db::init_db;
use crate::error::SyncError;
use crate::merge::{merge_records, LogicalRecord};
use crate::metadata::SyncMetadata;
use crate::models::{Identity, RecordPayload, RecordType};
use crate::queue::{PendingCounts, QueueEntry, QueueStatus, QueueStore};
use crate::remote::RemoteStore;
use crate::sync::{SyncOrchestrator, SyncOutcome, SyncTrigger};

/// What a logical delete actually removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub removed_from_queue: u64,
    pub removed_from_cache: bool,
    pub remote_deleted: bool,
}

/// Snapshot of the engine state for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub online: bool,
    pub sync_in_progress: bool,
    pub pending: PendingCounts,
    pub needs_attention: usize,
    pub last_push_at: Option<DateTime<Utc>>,
    pub last_pull_at: BTreeMap<RecordType, Option<DateTime<Utc>>>,
}

pub struct SyncEngine {
    pool: SqlitePool,
    queue: QueueStore,
    cache: RecordCache,
    metadata: SyncMetadata,
    connectivity: ConnectivityMonitor,
    orchestrator: Arc<SyncOrchestrator>,
    settings: SyncSettings,
}

impl SyncEngine {
    /// Opens (or creates) the local database and recovers entries left
    /// claimed by a process that died mid-push. Claims younger than
    /// [`SyncSettings::claim_timeout`] are left to their owner.
    pub async fn open(
        db_path: &Path,
        remote: Arc<dyn RemoteStore>,
        connectivity: ConnectivityMonitor,
        settings: SyncSettings,
    ) -> Result<Self, SyncError> {
        let pool = init_db(db_path).await?;
        let queue = QueueStore::new(pool.clone(), settings.max_retries);
        let cache = RecordCache::new(pool.clone());
        let metadata = SyncMetadata::new(pool.clone());

        let released = queue.release_orphaned_claims(settings.claim_timeout).await?;
        if released > 0 {
            warn!(released, "released queue entries left in syncing state");
        }

        let orchestrator = Arc::new(SyncOrchestrator::new(
            queue.clone(),
            cache.clone(),
            metadata.clone(),
            remote,
            connectivity.clone(),
            &settings,
        ));

        info!(path = %db_path.display(), "sync engine opened");

        Ok(Self {
            pool,
            queue,
            cache,
            metadata,
            connectivity,
            orchestrator,
            settings,
        })
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Records a new write locally. Never touches the network.
    pub async fn enqueue(&self, payload: impl Into<RecordPayload>) -> Result<QueueEntry, SyncError> {
        let payload = payload.into();
        let entry = self.queue.enqueue(&payload).await?;
        info!(id = %entry.id, record_type = %entry.record_type, "record queued");
        Ok(entry)
    }

    pub async fn merged_view(&self, record_type: RecordType) -> Result<Vec<LogicalRecord>, SyncError> {
        let queued = self.queue.list_by_type(record_type).await?;
        let cached = self.cache.list_all(record_type).await?;
        Ok(merge_records(queued, cached))
    }

    pub async fn run_sync(&self) -> Result<SyncOutcome, SyncError> {
        self.orchestrator.run_sync().await
    }

    pub async fn run_sync_with(&self, trigger: SyncTrigger) -> Result<SyncOutcome, SyncError> {
        self.orchestrator.run(trigger).await
    }

    pub async fn pending_counts(&self) -> Result<PendingCounts, SyncError> {
        self.queue.count().await
    }

    /// Entries that exhausted their retries and are no longer pushed.
    pub async fn needs_attention(
        &self,
        record_type: Option<RecordType>,
    ) -> Result<Vec<QueueEntry>, SyncError> {
        self.queue.list_needs_attention(record_type).await
    }

    /// Makes a failed entry eligible again with a fresh retry budget.
    pub async fn retry_entry(&self, id: Uuid) -> Result<QueueEntry, SyncError> {
        self.ensure_not_syncing(id).await?;
        if !self.queue.reset_for_retry(id).await? {
            return Err(SyncError::EntryBusy(id));
        }
        self.queue.get(id).await?.ok_or(SyncError::EntryNotFound(id))
    }

    /// Drops a queued entry without pushing it.
    pub async fn discard_entry(&self, id: Uuid) -> Result<(), SyncError> {
        self.ensure_not_syncing(id).await?;
        if !self.queue.discard(id).await? {
            return Err(SyncError::EntryBusy(id));
        }
        info!(%id, "queue entry discarded");
        Ok(())
    }

    async fn ensure_not_syncing(&self, id: Uuid) -> Result<QueueEntry, SyncError> {
        match self.queue.get(id).await? {
            None => Err(SyncError::EntryNotFound(id)),
            Some(entry) if entry.status == QueueStatus::Syncing => Err(SyncError::EntryBusy(id)),
            Some(entry) => Ok(entry),
        }
    }

    /// Removes a record wherever it lives.
    ///
    /// Local removal always happens; the remote delete is attempted only for
    /// remote identities and only while online, and its failure is reported
    /// rather than returned.
    pub async fn delete_logical_record(
        &self,
        record_type: RecordType,
        identity: &Identity,
    ) -> Result<DeleteReport, SyncError> {
        let mut report = DeleteReport::default();

        match identity {
            Identity::Local(id) => {
                let entry = self.ensure_not_syncing(*id).await?;
                if self.queue.discard(entry.id).await? {
                    report.removed_from_queue = 1;
                }
            }
            Identity::Remote(remote_id) => {
                for entry in self.queue.list_by_type(record_type).await? {
                    if entry.payload.remote_id() != Some(remote_id.as_str()) {
                        continue;
                    }
                    if entry.status == QueueStatus::Syncing {
                        return Err(SyncError::EntryBusy(entry.id));
                    }
                    if self.queue.discard(entry.id).await? {
                        report.removed_from_queue += 1;
                    }
                }

                report.removed_from_cache = self.cache.delete(record_type, remote_id).await?;
                report.remote_deleted = self
                    .orchestrator
                    .delete_remote(record_type, remote_id)
                    .await;
            }
        }

        info!(
            %identity,
            %record_type,
            removed_from_queue = report.removed_from_queue,
            removed_from_cache = report.removed_from_cache,
            remote_deleted = report.remote_deleted,
            "record deleted"
        );
        Ok(report)
    }

    /// Partial update of an already-synced record. Requires connectivity.
    pub async fn update_remote_fields(
        &self,
        record_type: RecordType,
        remote_id: &str,
        fields: Value,
    ) -> Result<(), SyncError> {
        self.orchestrator
            .update_remote(record_type, remote_id, fields)
            .await
    }

    pub async fn last_pull_at(&self, record_type: RecordType) -> Result<Option<DateTime<Utc>>, SyncError> {
        self.metadata.last_pull_at(record_type).await
    }

    pub async fn status(&self) -> Result<SyncStatus, SyncError> {
        let mut last_pull_at = BTreeMap::new();
        for record_type in RecordType::ALL {
            last_pull_at.insert(record_type, self.metadata.last_pull_at(record_type).await?);
        }

        Ok(SyncStatus {
            online: self.connectivity.is_online(),
            sync_in_progress: self.orchestrator.is_running(),
            pending: self.queue.count().await?,
            needs_attention: self.queue.list_needs_attention(None).await?.len(),
            last_push_at: self.metadata.last_push_at().await?,
            last_pull_at,
        })
    }

    /// Starts background syncing on reconnect and on the configured
    /// interval.
    pub fn spawn_auto_sync(&self) -> JoinHandle<()> {
        self.orchestrator
            .spawn_auto_sync(self.settings.auto_sync_interval)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::Origin;
    use crate::models::{BirthRecord, PregnancyRecord};
    use crate::remote::MemoryRemoteStore;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    struct TestContext {
        engine: SyncEngine,
        remote: Arc<MemoryRemoteStore>,
        db_path: PathBuf,
        _temp_dir: TempDir,
    }

    async fn setup(online: bool) -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("fieldsync.db");
        let remote = Arc::new(MemoryRemoteStore::new());
        let engine = SyncEngine::open(
            &db_path,
            remote.clone(),
            ConnectivityMonitor::new(online),
            SyncSettings::default(),
        )
        .await
        .unwrap();

        TestContext {
            engine,
            remote,
            db_path,
            _temp_dir: temp_dir,
        }
    }

    fn birth() -> BirthRecord {
        let dob = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        BirthRecord::new("Amina", dob, "agent-7")
    }

    #[tokio::test]
    async fn test_offline_capture_then_sync_scenario() {
        let ctx = setup(false).await;
        ctx.remote.set_next_id(42).await;

        let entry = ctx.engine.enqueue(birth()).await.unwrap();
        let view = ctx.engine.merged_view(RecordType::Birth).await.unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].origin, Origin::Local);
        assert_eq!(view[0].identity, Identity::Local(entry.id));

        ctx.engine.connectivity().set_online(true);
        let outcome = ctx.engine.run_sync().await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Completed(_)));

        assert_eq!(ctx.engine.pending_counts().await.unwrap()[&RecordType::Birth], 0);
        assert!(ctx.engine.cache().get(RecordType::Birth, "doc42").await.unwrap().is_some());

        let view = ctx.engine.merged_view(RecordType::Birth).await.unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].origin, Origin::Remote);
        assert_eq!(view[0].identity, Identity::Remote("doc42".to_string()));
    }

    #[tokio::test]
    async fn test_merged_view_is_per_type() {
        let ctx = setup(false).await;
        ctx.engine.enqueue(birth()).await.unwrap();
        ctx.engine
            .enqueue(PregnancyRecord::new("Grace", "Kisoro", "agent-7"))
            .await
            .unwrap();

        assert_eq!(ctx.engine.merged_view(RecordType::Birth).await.unwrap().len(), 1);
        assert_eq!(ctx.engine.merged_view(RecordType::Pregnancy).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_releases_orphaned_claims() {
        let ctx = setup(true).await;
        let entry = ctx.engine.enqueue(birth()).await.unwrap();
        assert!(ctx.engine.queue().mark_syncing(entry.id).await.unwrap());
        ctx.engine.close().await;

        let engine = SyncEngine::open(
            &ctx.db_path,
            ctx.remote.clone(),
            ConnectivityMonitor::new(true),
            SyncSettings::default().with_claim_timeout(Duration::ZERO),
        )
        .await
        .unwrap();

        let stored = engine.queue().get(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Pending);
        assert!(!engine.orchestrator().is_running());
    }

    #[tokio::test]
    async fn test_second_engine_leaves_live_claim_alone() {
        let ctx = setup(true).await;
        let entry = ctx.engine.enqueue(birth()).await.unwrap();
        // First engine is mid-push on this entry.
        assert!(ctx.engine.queue().mark_syncing(entry.id).await.unwrap());

        let second = SyncEngine::open(
            &ctx.db_path,
            ctx.remote.clone(),
            ConnectivityMonitor::new(true),
            SyncSettings::default(),
        )
        .await
        .unwrap();

        let stored = second.queue().get(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Syncing);

        match second.run_sync().await.unwrap() {
            SyncOutcome::Completed(report) => {
                assert!(report.push.pushed.is_empty());
                assert!(report.push.failed.is_empty());
            }
            SyncOutcome::AlreadyRunning => panic!("second engine has its own lease"),
        }
        assert_eq!(ctx.remote.create_calls().await, 0);

        // The owner finishes its push; exactly one remote document results.
        let document = entry.payload.to_document().unwrap();
        ctx.remote.create("births", document).await.unwrap();
        ctx.engine.queue().mark_synced(entry.id).await.unwrap();

        assert_eq!(ctx.remote.len("births").await, 1);
        assert!(second.queue().get(entry.id).await.unwrap().is_none());
        second.close().await;
    }

    #[tokio::test]
    async fn test_delete_local_record() {
        let ctx = setup(false).await;
        let entry = ctx.engine.enqueue(birth()).await.unwrap();

        let report = ctx
            .engine
            .delete_logical_record(RecordType::Birth, &Identity::Local(entry.id))
            .await
            .unwrap();

        assert_eq!(report.removed_from_queue, 1);
        assert!(!report.remote_deleted);
        assert!(ctx.engine.merged_view(RecordType::Birth).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_syncing_record_is_refused() {
        let ctx = setup(false).await;
        let entry = ctx.engine.enqueue(birth()).await.unwrap();
        ctx.engine.queue().mark_syncing(entry.id).await.unwrap();

        let result = ctx
            .engine
            .delete_logical_record(RecordType::Birth, &Identity::Local(entry.id))
            .await;

        assert!(matches!(result, Err(SyncError::EntryBusy(id)) if id == entry.id));
        assert!(ctx.engine.queue().get(entry.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_remote_record_online() {
        let ctx = setup(true).await;
        ctx.engine.enqueue(birth()).await.unwrap();
        ctx.engine.run_sync().await.unwrap();

        let report = ctx
            .engine
            .delete_logical_record(RecordType::Birth, &Identity::Remote("doc1".to_string()))
            .await
            .unwrap();

        assert!(report.removed_from_cache);
        assert!(report.remote_deleted);
        assert_eq!(ctx.remote.len("births").await, 0);
    }

    #[tokio::test]
    async fn test_delete_remote_record_offline_is_local_only() {
        let ctx = setup(true).await;
        ctx.engine.enqueue(birth()).await.unwrap();
        ctx.engine.run_sync().await.unwrap();
        ctx.engine.connectivity().set_online(false);

        let report = ctx
            .engine
            .delete_logical_record(RecordType::Birth, &Identity::Remote("doc1".to_string()))
            .await
            .unwrap();

        assert!(report.removed_from_cache);
        assert!(!report.remote_deleted);
        assert_eq!(ctx.remote.len("births").await, 1);
        assert!(ctx.engine.merged_view(RecordType::Birth).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_and_discard_entries() {
        let ctx = setup(true).await;
        ctx.remote.fail_next_creates(3).await;
        let entry = ctx.engine.enqueue(birth()).await.unwrap();
        for _ in 0..3 {
            ctx.engine.run_sync().await.unwrap();
        }

        let stuck = ctx.engine.needs_attention(None).await.unwrap();
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].id, entry.id);

        let retried = ctx.engine.retry_entry(entry.id).await.unwrap();
        assert_eq!(retried.status, QueueStatus::Pending);
        assert_eq!(retried.retry_count, 0);
        assert!(ctx.engine.needs_attention(None).await.unwrap().is_empty());

        ctx.engine.discard_entry(entry.id).await.unwrap();
        assert!(matches!(
            ctx.engine.discard_entry(entry.id).await,
            Err(SyncError::EntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_remote_fields() {
        let ctx = setup(true).await;
        ctx.engine.enqueue(birth()).await.unwrap();
        ctx.engine.run_sync().await.unwrap();

        ctx.engine
            .update_remote_fields(RecordType::Birth, "doc1", json!({"notes": "checked"}))
            .await
            .unwrap();

        assert_eq!(ctx.remote.get("births", "doc1").await.unwrap()["notes"], "checked");
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let ctx = setup(false).await;
        ctx.engine.enqueue(birth()).await.unwrap();

        let status = ctx.engine.status().await.unwrap();
        assert!(!status.online);
        assert!(!status.sync_in_progress);
        assert_eq!(status.pending[&RecordType::Birth], 1);
        assert_eq!(status.pending[&RecordType::Pregnancy], 0);
        assert_eq!(status.needs_attention, 0);
        assert!(status.last_push_at.is_none());
        assert_eq!(status.last_pull_at[&RecordType::Birth], None);

        ctx.engine.connectivity().set_online(true);
        ctx.engine.run_sync().await.unwrap();
        let status = ctx.engine.status().await.unwrap();
        assert!(status.last_push_at.is_some());
        assert!(ctx.engine.last_pull_at(RecordType::Birth).await.unwrap().is_some());
    }
}
