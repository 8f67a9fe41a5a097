//! Retry policy: decides when a failing operation gives up.

use crate::domain::{OperationStatus, QueuedOperation};

/// Retry ceiling for failed executions.
///
/// There is no backoff: a failed operation goes back to Pending and is picked up
/// by the *next* drain, never re-attempted within the same one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failures after which the operation is marked Failed.
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Has an operation with `retry_count` failures used up its retries?
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }

    /// Record one failed execution on `op` and return its new status.
    pub fn apply_failure(&self, op: &mut QueuedOperation, error: String) -> OperationStatus {
        let retry_count = op.record_failure(error);
        op.settle_failure(self.is_exhausted(retry_count))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityKind, OperationId, OperationKind};
    use chrono::Utc;
    use rstest::rstest;

    fn op() -> QueuedOperation {
        QueuedOperation::new(
            OperationId::new("op-1"),
            OperationKind::Update,
            EntityKind::Dashboard,
            serde_json::json!({}),
            Utc::now(),
        )
    }

    #[test]
    fn default_policy_allows_three_failures() {
        assert_eq!(RetryPolicy::default().max_retries, 3);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(5)]
    fn fails_exactly_on_the_ceiling(#[case] max_retries: u32) {
        let policy = RetryPolicy::new(max_retries);
        let mut op = op();

        for attempt in 1..max_retries {
            assert_eq!(
                policy.apply_failure(&mut op, format!("attempt {attempt}")),
                OperationStatus::Pending
            );
            assert!(!policy.is_exhausted(op.retry_count));
        }

        assert_eq!(
            policy.apply_failure(&mut op, "last".into()),
            OperationStatus::Failed
        );
        assert_eq!(op.retry_count, max_retries);
        assert_eq!(op.last_error.as_deref(), Some("last"));
        assert!(policy.is_exhausted(op.retry_count));
    }

    #[test]
    fn retried_operation_gets_the_full_ceiling_again() {
        let policy = RetryPolicy::new(2);
        let mut op = op();
        policy.apply_failure(&mut op, "a".into());
        assert_eq!(policy.apply_failure(&mut op, "b".into()), OperationStatus::Failed);

        op.reset_for_retry();
        assert_eq!(policy.apply_failure(&mut op, "c".into()), OperationStatus::Pending);
        assert_eq!(op.retry_count, 1);
    }
}
