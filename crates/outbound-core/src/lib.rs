//! outbound-core
//!
//! Offline operation queue: a durable, ordered, at-least-once buffer for
//! client mutations, replayed against a remote system once it is reachable.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, operation, status, events, errors）
//! - **ports**: 抽象化レイヤー（StorageAdapter, OperationExecutor, Clock, IdGenerator）
//! - **impls**: ports の実装（InMemoryStorage, FileStorage, FnExecutor）
//! - **queue**: OfflineQueue 本体（store, retry, notifier, processor, codec）
//! - **app**: 組み立てと運用（QueueBuilder, EntityRouter, SyncLoop）
//! - **config**: QueueConfig

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;

pub use app::{QueueBuilder, SyncLoop};
pub use config::QueueConfig;
pub use domain::{
    DrainReport, EntityKind, ExecutorError, OperationId, OperationKind, OperationStatus,
    QueueError, QueueEvent, QueueEventKind, QueueStatus, QueuedOperation,
};
pub use queue::OfflineQueue;
