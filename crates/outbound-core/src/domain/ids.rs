//! Operation identifiers.
//!
//! # ULID ベースの ID
//! 新しく生成される ID は `op-` プレフィックス + ULID です。
//! - 時刻でソート可能（生成順 = enqueue 順）
//! - 調整なしで生成可能
//!
//! ただし永続化されたスナップショットや import されたデータには任意の文字列が
//! 入り得るので、型としては opaque な文字列として扱います。

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Display / 生成時に使うプレフィックス
const PREFIX: &str = "op-";

/// Identifier of a queued operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Wrap an existing identifier (e.g. one read back from storage).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// ULID から ID を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(format!("{PREFIX}{ulid}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Ulid> for OperationId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl From<&str> for OperationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_prefix() {
        let id = OperationId::from_ulid(Ulid::new());
        assert!(id.as_str().starts_with("op-"));
        assert_eq!(id.as_str().len(), PREFIX.len() + 26);
    }

    #[test]
    fn ulid_ids_are_sortable() {
        // ULID は時刻ベースなので、生成順序でソート可能
        let id1 = OperationId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = OperationId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = OperationId::new("legacy-42");
        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, "\"legacy-42\"");

        let deserialized: OperationId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, id);
    }
}
