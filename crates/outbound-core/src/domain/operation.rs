//! Queued operation: the unit of work buffered while offline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::OperationId;

/// What the operation does to its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

/// Which domain entity the operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Workout,
    Achievement,
    Dashboard,
}

/// Operation status.
///
/// State transitions:
/// - Pending -> Processing -> Completed
/// - Pending -> Processing -> Pending (failure, retries remain; picked up by the next drain)
/// - Pending -> Processing -> Failed (failure, retry ceiling reached)
/// - Failed -> Pending (explicit retry only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    /// Waiting for the next drain.
    Pending,

    /// Executor is running. Never survives a reload (collapsed back to Pending).
    Processing,

    /// Gave up after exhausting retries.
    Failed,

    /// Delivered to the remote system.
    Completed,
}

impl OperationStatus {
    /// Eligible for the next drain?
    pub fn is_runnable(self) -> bool {
        matches!(self, OperationStatus::Pending)
    }

    /// Can be evicted to make room for new work?
    pub fn is_settled(self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Failed)
    }
}

macro_rules! display_as_debug {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        })*
    };
}

display_as_debug!(OperationKind, EntityKind, OperationStatus);

/// A client-originated mutation waiting to be replayed against the remote system.
///
/// Field names are the persisted layout; do not rename them without a migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub entity: EntityKind,

    /// Caller-defined; the queue never looks inside.
    pub payload: serde_json::Value,

    pub created_at: DateTime<Utc>,

    /// Number of failed executions since creation (or since the last explicit retry).
    pub retry_count: u32,

    pub status: OperationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueuedOperation {
    pub fn new(
        id: OperationId,
        kind: OperationKind,
        entity: EntityKind,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            entity,
            payload,
            created_at,
            retry_count: 0,
            status: OperationStatus::Pending,
            last_error: None,
        }
    }

    /// Mark as handed to the executor.
    pub fn start_processing(&mut self) {
        self.status = OperationStatus::Processing;
    }

    pub fn mark_completed(&mut self) {
        self.status = OperationStatus::Completed;
    }

    /// Count one failed execution and keep its message. Returns the new
    /// retry count; the status is settled by [`settle_failure`](Self::settle_failure).
    pub fn record_failure(&mut self, error: String) -> u32 {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_error = Some(error);
        self.retry_count
    }

    /// Failed once retries are used up, otherwise back to Pending for the next drain.
    pub fn settle_failure(&mut self, exhausted: bool) -> OperationStatus {
        self.status = if exhausted {
            OperationStatus::Failed
        } else {
            OperationStatus::Pending
        };
        self.status
    }

    /// Give a Failed operation a fresh set of retries.
    pub fn reset_for_retry(&mut self) {
        self.status = OperationStatus::Pending;
        self.retry_count = 0;
        self.last_error = None;
    }

    /// Completed and created before `cutoff`?
    pub fn is_stale_completion(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == OperationStatus::Completed && self.created_at < cutoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample() -> QueuedOperation {
        QueuedOperation::new(
            OperationId::new("op-1"),
            OperationKind::Create,
            EntityKind::Workout,
            serde_json::json!({"name": "leg day"}),
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn new_operation_is_pending_with_no_retries() {
        let op = sample();
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 0);
        assert!(op.last_error.is_none());
    }

    #[test]
    fn recorded_failure_keeps_message_and_status() {
        let mut op = sample();
        op.start_processing();
        assert_eq!(op.record_failure("timeout".into()), 1);
        assert_eq!(op.record_failure("reset by peer".into()), 2);
        assert_eq!(op.status, OperationStatus::Processing);
        assert_eq!(op.last_error.as_deref(), Some("reset by peer"));
    }

    #[test]
    fn settled_failure_is_pending_or_failed() {
        let mut op = sample();
        op.start_processing();
        assert_eq!(op.settle_failure(false), OperationStatus::Pending);
        op.start_processing();
        assert_eq!(op.settle_failure(true), OperationStatus::Failed);
    }

    #[test]
    fn reset_clears_retry_bookkeeping() {
        let mut op = sample();
        op.record_failure("boom".into());
        op.settle_failure(true);
        op.reset_for_retry();
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 0);
        assert!(op.last_error.is_none());
    }

    #[test]
    fn only_old_completions_are_stale() {
        let mut op = sample();
        let cutoff = op.created_at + Duration::hours(1);
        assert!(!op.is_stale_completion(cutoff));

        op.mark_completed();
        assert!(op.is_stale_completion(cutoff));
        assert!(!op.is_stale_completion(op.created_at));
    }

    #[test]
    fn persisted_layout_uses_fixed_names() {
        let mut op = sample();
        op.record_failure("offline".into());
        op.settle_failure(false);
        let value = serde_json::to_value(&op).unwrap();

        assert_eq!(value["id"], "op-1");
        assert_eq!(value["kind"], "Create");
        assert_eq!(value["entity"], "Workout");
        assert_eq!(value["retryCount"], 1);
        assert_eq!(value["status"], "Pending");
        assert_eq!(value["lastError"], "offline");
        assert!(value.get("createdAt").is_some());
    }
}
