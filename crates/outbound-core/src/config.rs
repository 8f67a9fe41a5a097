//! Queue configuration.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Storage key the whole queue is snapshotted under.
pub const DEFAULT_STORAGE_KEY: &str = "offline_queue";

/// Tunables for an [`OfflineQueue`](crate::queue::OfflineQueue).
///
/// Every field has a default, so a partial TOML/JSON document is enough:
///
/// ```toml
/// max_size = 500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Capacity. Enqueue evicts Completed/Failed operations when this is reached.
    pub max_size: usize,

    /// Failed executions after which an operation becomes Failed.
    pub max_retries: u32,

    /// Completed operations older than this are evicted after each drain.
    pub completed_ttl_secs: u64,

    pub storage_key: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            max_retries: 3,
            completed_ttl_secs: 24 * 60 * 60,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl QueueConfig {
    pub fn completed_ttl(&self) -> TimeDelta {
        i64::try_from(self.completed_ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = QueueConfig::default();
        assert_eq!(config.max_size, 1000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.completed_ttl(), TimeDelta::hours(24));
        assert_eq!(config.storage_key, "offline_queue");
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let config: QueueConfig = serde_json::from_str(r#"{"max_size": 10}"#).unwrap();
        assert_eq!(config.max_size, 10);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn huge_ttl_saturates() {
        let config = QueueConfig {
            completed_ttl_secs: u64::MAX,
            ..QueueConfig::default()
        };
        assert_eq!(config.completed_ttl(), TimeDelta::MAX);
    }
}
