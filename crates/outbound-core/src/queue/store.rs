//! In-memory queue state.
//!
//! Design:
//! - This is the single source of truth during a process lifetime.
//! - Insertion order is processing order (FIFO); nothing ever re-sorts it.
//! - No I/O here. [`OfflineQueue`](super::OfflineQueue) persists after mutating.

use chrono::{DateTime, Utc};

use crate::domain::{EntityKind, OperationId, OperationStatus, QueueStatus, QueuedOperation};

#[derive(Debug, Clone, Default)]
pub struct QueueStore {
    operations: Vec<QueuedOperation>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_operations(operations: Vec<QueuedOperation>) -> Self {
        Self { operations }
    }

    pub fn operations(&self) -> &[QueuedOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn contains(&self, id: &OperationId) -> bool {
        self.get(id).is_some()
    }

    pub fn push(&mut self, op: QueuedOperation) {
        self.operations.push(op);
    }

    pub fn get(&self, id: &OperationId) -> Option<&QueuedOperation> {
        self.operations.iter().find(|op| &op.id == id)
    }

    pub fn get_mut(&mut self, id: &OperationId) -> Option<&mut QueuedOperation> {
        self.operations.iter_mut().find(|op| &op.id == id)
    }

    /// Get counts by status.
    pub fn status(&self) -> QueueStatus {
        let mut status = QueueStatus {
            total: self.operations.len(),
            ..QueueStatus::default()
        };
        for op in &self.operations {
            match op.status {
                OperationStatus::Pending => status.pending += 1,
                OperationStatus::Processing => status.processing += 1,
                OperationStatus::Completed => status.completed += 1,
                OperationStatus::Failed => status.failed += 1,
            }
        }
        status
    }

    pub fn with_status(&self, status: OperationStatus) -> Vec<QueuedOperation> {
        self.operations
            .iter()
            .filter(|op| op.status == status)
            .cloned()
            .collect()
    }

    pub fn with_entity(&self, entity: EntityKind) -> Vec<QueuedOperation> {
        self.operations
            .iter()
            .filter(|op| op.entity == entity)
            .cloned()
            .collect()
    }

    /// IDs of runnable operations, in FIFO order.
    pub fn pending_ids(&self) -> Vec<OperationId> {
        self.operations
            .iter()
            .filter(|op| op.status.is_runnable())
            .map(|op| op.id.clone())
            .collect()
    }

    pub fn remove(&mut self, id: &OperationId) -> Option<QueuedOperation> {
        let index = self.operations.iter().position(|op| &op.id == id)?;
        Some(self.operations.remove(index))
    }

    /// Drop every operation matching `pred`, returning how many went.
    fn evict_where(&mut self, pred: impl Fn(&QueuedOperation) -> bool) -> usize {
        let before = self.operations.len();
        self.operations.retain(|op| !pred(op));
        before - self.operations.len()
    }

    /// Make room: drop Completed and Failed operations.
    pub fn evict_settled(&mut self) -> usize {
        self.evict_where(|op| op.status.is_settled())
    }

    pub fn clear_completed(&mut self) -> usize {
        self.evict_where(|op| op.status == OperationStatus::Completed)
    }

    /// Drop Completed operations created before `cutoff`.
    pub fn evict_stale_completed(&mut self, cutoff: DateTime<Utc>) -> usize {
        self.evict_where(|op| op.is_stale_completion(cutoff))
    }

    pub fn clear(&mut self) {
        self.operations.clear();
    }

    /// Reset every Failed operation to Pending with a fresh retry count.
    pub fn reset_failed(&mut self) -> usize {
        let mut count = 0;
        for op in self
            .operations
            .iter_mut()
            .filter(|op| op.status == OperationStatus::Failed)
        {
            op.reset_for_retry();
            count += 1;
        }
        count
    }

    /// Collapse operations left in Processing (by a crash or an abandoned
    /// drain) back to Pending. Retry counts are kept.
    pub fn recover_interrupted(&mut self) -> usize {
        let mut count = 0;
        for op in self
            .operations
            .iter_mut()
            .filter(|op| op.status == OperationStatus::Processing)
        {
            op.status = OperationStatus::Pending;
            count += 1;
        }
        count
    }
}
