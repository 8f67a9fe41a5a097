//! Queue module: the offline operation queue and its parts.
//!
//! - `store`: in-memory state (single source of truth)
//! - `retry`: retry ceiling
//! - `notifier`: typed publish/subscribe
//! - `processor`: sequential, single-flight drain
//! - `codec`: snapshot / export encoding

pub mod codec;
mod notifier;
mod processor;
mod retry;
mod store;

pub use notifier::{EmitPermit, Notifier, SubscriptionId};
pub use retry::RetryPolicy;
pub use store::QueueStore;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::domain::{
    EntityKind, OperationId, OperationKind, OperationStatus, QueueError, QueueEvent,
    QueueEventKind, QueueStatus, QueuedOperation,
};
use crate::ports::{Clock, IdGenerator, StorageAdapter};

/// Durable, ordered, at-least-once buffer of client mutations.
///
/// Construct with [`QueueBuilder`](crate::app::QueueBuilder), call
/// [`initialize`](Self::initialize) once to load the previous snapshot, then
/// share it (usually as `Arc<OfflineQueue>`).
///
/// Design:
/// - Every mutating call persists the full snapshot *while still holding the
///   state lock*, so snapshots reach storage in mutation order.
/// - Events fire after the lock is released, but the emission slot is reserved
///   before it, so events reach listeners in the order the changes happened,
///   on any runtime. Listeners may call back into the queue's read projections;
///   a slow listener delays the next mutation.
/// - Persistence failures are logged and otherwise ignored; the in-memory
///   state stays authoritative until the next successful write.
pub struct OfflineQueue {
    state: Mutex<QueueStore>,
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    retry_policy: RetryPolicy,
    config: QueueConfig,
    notifier: Notifier,
    draining: AtomicBool,
}

impl OfflineQueue {
    pub(crate) fn new(
        config: QueueConfig,
        storage: Arc<dyn StorageAdapter>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            state: Mutex::new(QueueStore::new()),
            storage,
            clock,
            ids,
            retry_policy: RetryPolicy::new(config.max_retries),
            config,
            notifier: Notifier::new(),
            draining: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Load the previously persisted snapshot, replacing the in-memory queue.
    ///
    /// Never fails: unreadable or undecodable snapshots are logged and the
    /// queue starts empty. Operations persisted mid-execution (Processing) go
    /// back to Pending.
    pub async fn initialize(&self) {
        let key = &self.config.storage_key;
        let loaded = match self.storage.get(key).await {
            Ok(Some(bytes)) => match codec::decode_snapshot(&bytes) {
                Ok(operations) => operations,
                Err(e) => {
                    error!(key = %key, error = %e, "discarding unreadable queue snapshot");
                    Vec::new()
                }
            },
            Ok(None) => {
                debug!(key = %key, "no queue snapshot yet");
                Vec::new()
            }
            Err(e) => {
                warn!(key = %key, error = %e, "failed to read queue snapshot; starting empty");
                Vec::new()
            }
        };

        let mut store = QueueStore::from_operations(loaded);
        let recovered = store.recover_interrupted();
        if recovered > 0 {
            warn!(recovered, "operations interrupted mid-execution reset to Pending");
        }
        info!(operations = store.len(), "offline queue initialized");

        *self.state.lock().await = store;
    }

    /// Append a new Pending operation and persist it before returning its id.
    ///
    /// At capacity, Completed and Failed operations are evicted first; if that
    /// frees nothing the call fails with `CapacityExceeded`.
    pub async fn enqueue(
        &self,
        kind: OperationKind,
        entity: EntityKind,
        payload: serde_json::Value,
    ) -> Result<OperationId, QueueError> {
        let (op, permit) = {
            let mut state = self.state.lock().await;

            if state.len() >= self.config.max_size {
                let evicted = state.evict_settled();
                debug!(evicted, "queue at capacity; evicted settled operations");
                if state.len() >= self.config.max_size {
                    if evicted > 0 {
                        self.persist(&state).await;
                    }
                    warn!(max_size = self.config.max_size, "enqueue rejected: queue full");
                    return Err(QueueError::CapacityExceeded {
                        max_size: self.config.max_size,
                    });
                }
            }

            let mut id = self.ids.generate();
            while state.contains(&id) {
                id = self.ids.generate();
            }

            let op = QueuedOperation::new(id, kind, entity, payload, self.clock.now());
            state.push(op.clone());
            self.persist(&state).await;
            (op, self.notifier.reserve())
        };

        debug!(op_id = %op.id, kind = %op.kind, entity = %op.entity, "operation enqueued");
        let id = op.id.clone();
        permit.emit(&QueueEvent::Enqueued(op));
        Ok(id)
    }

    /// Counts by status. Read-only.
    pub async fn status(&self) -> QueueStatus {
        self.state.lock().await.status()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.is_empty()
    }

    pub async fn get_operation(&self, id: &OperationId) -> Option<QueuedOperation> {
        self.state.lock().await.get(id).cloned()
    }

    /// Every operation, in queue order.
    pub async fn operations(&self) -> Vec<QueuedOperation> {
        self.state.lock().await.operations().to_vec()
    }

    pub async fn pending_operations(&self) -> Vec<QueuedOperation> {
        self.state
            .lock()
            .await
            .with_status(OperationStatus::Pending)
    }

    pub async fn failed_operations(&self) -> Vec<QueuedOperation> {
        self.state.lock().await.with_status(OperationStatus::Failed)
    }

    pub async fn operations_by_entity(&self, entity: EntityKind) -> Vec<QueuedOperation> {
        self.state.lock().await.with_entity(entity)
    }

    pub async fn remove_operation(&self, id: &OperationId) -> Result<QueuedOperation, QueueError> {
        let (removed, permit) = {
            let mut state = self.state.lock().await;
            let removed = state
                .remove(id)
                .ok_or_else(|| QueueError::NotFound(id.clone()))?;
            self.persist(&state).await;
            (removed, self.notifier.reserve())
        };

        debug!(op_id = %id, "operation removed");
        permit.emit(&QueueEvent::OperationRemoved(removed.clone()));
        Ok(removed)
    }

    /// Remove Completed operations; returns how many were removed.
    pub async fn clear_completed(&self) -> usize {
        let (count, permit) = {
            let mut state = self.state.lock().await;
            let count = state.clear_completed();
            self.persist(&state).await;
            (count, self.notifier.reserve())
        };

        debug!(count, "completed operations cleared");
        permit.emit(&QueueEvent::CompletedCleared { count });
        count
    }

    pub async fn clear_all(&self) {
        let permit = {
            let mut state = self.state.lock().await;
            state.clear();
            self.persist(&state).await;
            self.notifier.reserve()
        };

        info!("offline queue cleared");
        permit.emit(&QueueEvent::AllCleared);
    }

    /// Give a Failed operation a fresh set of retries.
    pub async fn retry_operation(&self, id: &OperationId) -> Result<(), QueueError> {
        let (op, permit) = {
            let mut state = self.state.lock().await;
            let op = state
                .get_mut(id)
                .ok_or_else(|| QueueError::NotFound(id.clone()))?;
            if op.status != OperationStatus::Failed {
                return Err(QueueError::InvalidState {
                    id: id.clone(),
                    status: op.status,
                });
            }
            op.reset_for_retry();
            let op = op.clone();
            self.persist(&state).await;
            (op, self.notifier.reserve())
        };

        debug!(op_id = %id, "failed operation reset for retry");
        permit.emit(&QueueEvent::OperationRetried(op));
        Ok(())
    }

    /// Reset every Failed operation in one persisted batch.
    pub async fn retry_all_failed(&self) -> usize {
        let (count, permit) = {
            let mut state = self.state.lock().await;
            let count = state.reset_failed();
            self.persist(&state).await;
            (count, self.notifier.reserve())
        };

        debug!(count, "all failed operations reset for retry");
        permit.emit(&QueueEvent::AllFailedRetried { count });
        count
    }

    /// Serialize the whole queue for diagnostics / recovery.
    pub async fn export_queue(&self) -> Result<String, QueueError> {
        let state = self.state.lock().await;
        codec::encode_export(state.operations(), self.clock.now())
    }

    /// Replace the queue with previously exported data and persist it.
    ///
    /// On any error the current queue is left untouched. Returns the number of
    /// operations imported.
    pub async fn import_queue(&self, data: &str) -> Result<usize, QueueError> {
        let operations = codec::decode_import(data)?;
        if operations.len() > self.config.max_size {
            return Err(QueueError::InvalidFormat(format!(
                "{} operations exceed max_size={}",
                operations.len(),
                self.config.max_size
            )));
        }

        let mut store = QueueStore::from_operations(operations);
        let recovered = store.recover_interrupted();
        let count = store.len();

        let mut state = self.state.lock().await;
        *state = store;
        self.persist(&state).await;

        info!(count, recovered, "offline queue imported");
        Ok(count)
    }

    /// Size in bytes of the persisted snapshot.
    pub async fn queue_size(&self) -> usize {
        let state = self.state.lock().await;
        codec::encode_snapshot(state.operations())
            .map(|bytes| bytes.len())
            .unwrap_or(0)
    }

    /// Call `listener` for events of `kind`.
    pub fn subscribe<F>(&self, kind: QueueEventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe(kind, listener)
    }

    /// Call `listener` for every event.
    pub fn subscribe_all<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe_all(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Channel of events; `None` receives everything.
    pub fn events(&self, filter: Option<QueueEventKind>) -> UnboundedReceiver<QueueEvent> {
        self.notifier.channel(filter)
    }

    /// Write the current snapshot and report the outcome.
    ///
    /// Mutating calls persist on their own but only log a failed write; call
    /// this when the caller has to know the queue reached storage, e.g. before
    /// the process exits.
    pub async fn flush(&self) -> Result<(), QueueError> {
        let state = self.state.lock().await;
        self.write_snapshot(&state).await
    }

    async fn write_snapshot(&self, store: &QueueStore) -> Result<(), QueueError> {
        let bytes = codec::encode_snapshot(store.operations())
            .map_err(|e| QueueError::InvalidFormat(format!("snapshot: {e}")))?;
        self.storage.set(&self.config.storage_key, bytes).await?;
        Ok(())
    }

    /// Write the snapshot. Failures are logged, never returned.
    ///
    /// Callers hold the state lock across this call.
    async fn persist(&self, store: &QueueStore) {
        if let Err(e) = self.write_snapshot(store).await {
            warn!(
                key = %self.config.storage_key,
                error = %e,
                "failed to persist queue snapshot; in-memory state kept"
            );
        }
    }
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("config", &self.config)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}
