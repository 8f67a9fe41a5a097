//! EntityRouter - entity ごとに executor を振り分ける
//!
//! Design:
//! - Built during initialization (mutable).
//! - Used during drains (immutable, shared behind `Arc`).
//! This avoids locks and keeps it simple.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{EntityKind, ExecutorError, QueuedOperation};
use crate::ports::OperationExecutor;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("duplicate executor for entity={0}")]
    DuplicateExecutor(EntityKind),
}

/// Registry of executors (entity -> executor), itself an executor.
///
/// An operation whose entity has no executor fails like any other executor
/// error, so it goes through the normal retry bookkeeping.
#[derive(Default)]
pub struct EntityRouter {
    executors: HashMap<EntityKind, Arc<dyn OperationExecutor>>,
}

impl EntityRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        entity: EntityKind,
        executor: Arc<dyn OperationExecutor>,
    ) -> Result<(), RouterError> {
        if self.executors.contains_key(&entity) {
            return Err(RouterError::DuplicateExecutor(entity));
        }
        self.executors.insert(entity, executor);
        Ok(())
    }

    pub fn get(&self, entity: EntityKind) -> Option<&Arc<dyn OperationExecutor>> {
        self.executors.get(&entity)
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

#[async_trait]
impl OperationExecutor for EntityRouter {
    async fn execute(&self, operation: &QueuedOperation) -> Result<(), ExecutorError> {
        let executor = self.get(operation.entity).ok_or_else(|| {
            ExecutorError::new(format!(
                "no executor registered for entity={}",
                operation.entity
            ))
        })?;

        executor.execute(operation).await
    }
}
