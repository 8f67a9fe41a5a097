//! InMemoryStorage - 開発用・テスト用の StorageAdapter
//!
//! # 学習ポイント
//! - std の Mutex は await を跨がない短いクリティカルセクションだけに使う
//! - 障害注入（書き込み/読み込み失敗）でキューの best-effort 永続化を検証できる

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::domain::StorageError;
use crate::ports::StorageAdapter;

/// InMemoryStorage は HashMap に blob を保持する
///
/// # 使用例
/// ```ignore
/// let storage = Arc::new(InMemoryStorage::new());
/// let queue = QueueBuilder::new(storage.clone()).build()?;
/// storage.fail_writes(true); // 以降の set は失敗する
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current blob under `key`, bypassing failure injection.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().ok()?.get(key).cloned()
    }

    /// Seed a blob directly, bypassing failure injection.
    pub fn put_raw(&self, key: &str, value: impl Into<Vec<u8>>) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(key.to_string(), value.into());
        }
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected read failure".into()));
        }
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))?;
        Ok(blobs.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected write failure".into()));
        }
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))?;
        blobs.insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let storage = InMemoryStorage::new();
        storage.set("k", b"hello".to_vec()).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(storage.get("missing").await.unwrap(), None);
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_reported() {
        let storage = InMemoryStorage::new();
        storage.put_raw("k", "seeded");

        storage.fail_writes(true);
        assert!(storage.set("k", b"new".to_vec()).await.is_err());
        assert_eq!(storage.raw("k"), Some(b"seeded".to_vec()));

        storage.fail_reads(true);
        assert!(storage.get("k").await.is_err());

        storage.fail_reads(false);
        storage.fail_writes(false);
        storage.set("k", b"new".to_vec()).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), Some(b"new".to_vec()));
    }
}
