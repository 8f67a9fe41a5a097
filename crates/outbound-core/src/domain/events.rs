//! Events - キューの状態遷移イベント
//!
//! 文字列のイベント名ではなく、enum（tagged union）で表現します。
//! 各 variant は対応する operation または件数を運びます。

use super::QueuedOperation;

/// A state transition observers can react to.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// A new operation was appended (and persisted).
    Enqueued(QueuedOperation),

    /// The executor succeeded.
    OperationCompleted(QueuedOperation),

    /// The executor failed and the retry ceiling was reached.
    OperationFailed(QueuedOperation),

    /// The executor failed; the operation goes back to Pending for the next drain.
    OperationRetry(QueuedOperation),

    /// A Failed operation was reset by `retry_operation`.
    OperationRetried(QueuedOperation),

    /// `retry_all_failed` reset this many operations.
    AllFailedRetried { count: usize },

    /// `remove_operation` removed this operation.
    OperationRemoved(QueuedOperation),

    /// `clear_completed` removed this many operations.
    CompletedCleared { count: usize },

    /// `clear_all` emptied the queue.
    AllCleared,
}

/// Discriminant of [`QueueEvent`], used to subscribe to a single event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueEventKind {
    Enqueued,
    OperationCompleted,
    OperationFailed,
    OperationRetry,
    OperationRetried,
    AllFailedRetried,
    OperationRemoved,
    CompletedCleared,
    AllCleared,
}

impl QueueEvent {
    pub fn kind(&self) -> QueueEventKind {
        match self {
            QueueEvent::Enqueued(_) => QueueEventKind::Enqueued,
            QueueEvent::OperationCompleted(_) => QueueEventKind::OperationCompleted,
            QueueEvent::OperationFailed(_) => QueueEventKind::OperationFailed,
            QueueEvent::OperationRetry(_) => QueueEventKind::OperationRetry,
            QueueEvent::OperationRetried(_) => QueueEventKind::OperationRetried,
            QueueEvent::AllFailedRetried { .. } => QueueEventKind::AllFailedRetried,
            QueueEvent::OperationRemoved(_) => QueueEventKind::OperationRemoved,
            QueueEvent::CompletedCleared { .. } => QueueEventKind::CompletedCleared,
            QueueEvent::AllCleared => QueueEventKind::AllCleared,
        }
    }

    /// The operation this event is about, if it is about a single one.
    pub fn operation(&self) -> Option<&QueuedOperation> {
        match self {
            QueueEvent::Enqueued(op)
            | QueueEvent::OperationCompleted(op)
            | QueueEvent::OperationFailed(op)
            | QueueEvent::OperationRetry(op)
            | QueueEvent::OperationRetried(op)
            | QueueEvent::OperationRemoved(op) => Some(op),
            QueueEvent::AllFailedRetried { .. }
            | QueueEvent::CompletedCleared { .. }
            | QueueEvent::AllCleared => None,
        }
    }
}
