//! OperationExecutor port - operation をリモートに反映する
//!
//! Queue は状態遷移を管理し、Executor は副作用（ネットワーク I/O など）を実行して
//! 結果を返すだけ。retry / failed の判断は Queue 側で行う。

use async_trait::async_trait;

use crate::domain::{ExecutorError, QueuedOperation};

/// Replays one operation against the remote system.
///
/// Called once per Pending operation per drain. An operation that failed with
/// retries left is handed over again on a later drain, so implementations must
/// tolerate seeing the same operation more than once.
///
/// The queue imposes no timeout: a call that never resolves stalls the drain.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(&self, operation: &QueuedOperation) -> Result<(), ExecutorError>;
}

#[async_trait]
impl<E: OperationExecutor + ?Sized> OperationExecutor for std::sync::Arc<E> {
    async fn execute(&self, operation: &QueuedOperation) -> Result<(), ExecutorError> {
        (**self).execute(operation).await
    }
}
