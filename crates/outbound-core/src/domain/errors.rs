//! Errors - エラー型と分類
//!
//! # 伝播ポリシー
//! - 構造的なエラー（CapacityExceeded / NotFound / InvalidState / InvalidFormat）は
//!   呼び出し元に返す
//! - 永続化の失敗はログに残すだけ（in-memory が正本）。`OfflineQueue::flush` だけは
//!   `Persistence` として返す
//! - Executor の失敗は operation の retry 状態に吸収される

use thiserror::Error;

use super::{OperationId, OperationStatus};

/// Errors surfaced by the queue's public operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is full (max_size={max_size}) and nothing could be evicted")]
    CapacityExceeded { max_size: usize },

    #[error("operation not found: {0}")]
    NotFound(OperationId),

    #[error("operation {id} is {status}, expected Failed")]
    InvalidState {
        id: OperationId,
        status: OperationStatus,
    },

    #[error("invalid queue data: {0}")]
    InvalidFormat(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StorageError),
}

/// Errors reported by a [`StorageAdapter`](crate::ports::StorageAdapter).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by an executor. The message ends up in `last_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ExecutorError(String);

impl ExecutorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }

    pub fn into_message(self) -> String {
        self.0
    }
}

impl From<String> for ExecutorError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ExecutorError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}
