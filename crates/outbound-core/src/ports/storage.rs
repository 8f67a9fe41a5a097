//! StorageAdapter port - キュー全体を 1 つの blob として保存する KV ストア
//!
//! # 設計原則
//! - キューは固定の 1 キーにスナップショット全体を書く
//! - 読み込み失敗は致命的ではない（空のキューで起動）
//! - 書き込み失敗はログに残すだけで、in-memory の変更は巻き戻さない

use async_trait::async_trait;

use crate::domain::StorageError;

/// Key-value blob store the queue snapshots itself into.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Read the blob stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the blob stored under `key`.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;
}
