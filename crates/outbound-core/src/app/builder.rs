//! QueueBuilder - キューの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 依存の注入（storage / clock / id generator）

use std::sync::Arc;
use std::time::Duration;

use crate::config::QueueConfig;
use crate::ports::{Clock, IdGenerator, StorageAdapter, SystemClock, UlidGenerator};
use crate::queue::OfflineQueue;

/// QueueBuilder は OfflineQueue を構築
///
/// # 使用例
/// ```ignore
/// let queue = QueueBuilder::new(Arc::new(FileStorage::new("./data")))
///     .max_size(500)
///     .build()?;
/// queue.initialize().await;
/// ```
///
/// # Fail-fast 設計
/// - build() 時に設定値をチェック
/// - 不正な値があれば BuildError を返す
pub struct QueueBuilder {
    storage: Arc<dyn StorageAdapter>,
    config: QueueConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError はキュー構築時のエラー
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("max_size must be at least 1")]
    ZeroCapacity,

    #[error("max_retries must be at least 1")]
    ZeroRetries,

    #[error("storage_key must not be empty")]
    EmptyStorageKey,
}

impl QueueBuilder {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            storage,
            config: QueueConfig::default(),
            clock: None,
            ids: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.config.max_size = max_size;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn completed_ttl(mut self, ttl: Duration) -> Self {
        self.config.completed_ttl_secs = ttl.as_secs();
        self
    }

    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.config.storage_key = key.into();
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// 設定を検証して OfflineQueue を生成
    ///
    /// The queue starts empty; call `initialize()` to load the snapshot.
    pub fn build(self) -> Result<OfflineQueue, BuildError> {
        if self.config.max_size == 0 {
            return Err(BuildError::ZeroCapacity);
        }
        if self.config.max_retries == 0 {
            return Err(BuildError::ZeroRetries);
        }
        if self.config.storage_key.is_empty() {
            return Err(BuildError::EmptyStorageKey);
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        Ok(OfflineQueue::new(self.config, self.storage, clock, ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryStorage;

    fn builder() -> QueueBuilder {
        QueueBuilder::new(Arc::new(InMemoryStorage::new()))
    }

    #[test]
    fn test_build_with_defaults() {
        let queue = builder().build().unwrap();
        assert_eq!(queue.config(), &QueueConfig::default());
        assert_eq!(queue.retry_policy().max_retries, 3);
    }

    #[test]
    fn test_overrides_are_applied() {
        let queue = builder()
            .max_size(10)
            .max_retries(5)
            .completed_ttl(Duration::from_secs(60))
            .storage_key("custom")
            .build()
            .unwrap();
        assert_eq!(queue.config().max_size, 10);
        assert_eq!(queue.config().completed_ttl_secs, 60);
        assert_eq!(queue.config().storage_key, "custom");
        assert_eq!(queue.retry_policy().max_retries, 5);
    }

    #[test]
    fn test_invalid_settings_fail_fast() {
        assert_eq!(builder().max_size(0).build().err(), Some(BuildError::ZeroCapacity));
        assert_eq!(builder().max_retries(0).build().err(), Some(BuildError::ZeroRetries));
        assert_eq!(
            builder().storage_key("").build().err(),
            Some(BuildError::EmptyStorageKey)
        );
    }
}
