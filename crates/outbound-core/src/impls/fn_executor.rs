//! FnExecutor - async クロージャを OperationExecutor として使う

use async_trait::async_trait;
use std::future::Future;

use crate::domain::{ExecutorError, QueuedOperation};
use crate::ports::OperationExecutor;

/// Adapts `Fn(QueuedOperation) -> impl Future<Output = Result<(), ExecutorError>>`.
///
/// The closure receives an owned copy of the operation so it can move it into
/// the returned future.
pub struct FnExecutor<F> {
    f: F,
}

impl<F> FnExecutor<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

/// Shorthand for [`FnExecutor::new`].
pub fn executor_fn<F, Fut>(f: F) -> FnExecutor<F>
where
    F: Fn(QueuedOperation) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ExecutorError>> + Send + 'static,
{
    FnExecutor::new(f)
}

#[async_trait]
impl<F, Fut> OperationExecutor for FnExecutor<F>
where
    F: Fn(QueuedOperation) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ExecutorError>> + Send + 'static,
{
    async fn execute(&self, operation: &QueuedOperation) -> Result<(), ExecutorError> {
        (self.f)(operation.clone()).await
    }
}
