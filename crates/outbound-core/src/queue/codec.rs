//! Snapshot / export encoding.
//!
//! - Snapshot: the persisted layout, one JSON array of operations.
//! - Export: the snapshot wrapped in a small versioned envelope, for
//!   diagnostics and manual recovery. Import accepts either form.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{QueueError, QueuedOperation};

pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportEnvelope {
    version: u32,
    exported_at: DateTime<Utc>,
    operations: Vec<QueuedOperation>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportEnvelopeRef<'a> {
    version: u32,
    exported_at: DateTime<Utc>,
    operations: &'a [QueuedOperation],
}

pub fn encode_snapshot(operations: &[QueuedOperation]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(operations)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<QueuedOperation>, QueueError> {
    let operations: Vec<QueuedOperation> = serde_json::from_slice(bytes)
        .map_err(|e| QueueError::InvalidFormat(format!("snapshot: {e}")))?;
    ensure_unique_ids(&operations)?;
    Ok(operations)
}

pub fn encode_export(
    operations: &[QueuedOperation],
    exported_at: DateTime<Utc>,
) -> Result<String, QueueError> {
    let envelope = ExportEnvelopeRef {
        version: EXPORT_VERSION,
        exported_at,
        operations,
    };
    serde_json::to_string_pretty(&envelope)
        .map_err(|e| QueueError::InvalidFormat(format!("export: {e}")))
}

/// Parse either an export envelope or a bare snapshot array.
pub fn decode_import(data: &str) -> Result<Vec<QueuedOperation>, QueueError> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| QueueError::InvalidFormat(format!("not JSON: {e}")))?;

    let operations = match value {
        serde_json::Value::Array(_) => serde_json::from_value::<Vec<QueuedOperation>>(value)
            .map_err(|e| QueueError::InvalidFormat(format!("operations: {e}")))?,
        serde_json::Value::Object(_) => {
            let envelope: ExportEnvelope = serde_json::from_value(value)
                .map_err(|e| QueueError::InvalidFormat(format!("export envelope: {e}")))?;
            if envelope.version != EXPORT_VERSION {
                return Err(QueueError::InvalidFormat(format!(
                    "unsupported export version {}",
                    envelope.version
                )));
            }
            envelope.operations
        }
        other => {
            return Err(QueueError::InvalidFormat(format!(
                "expected an array or an export object, got {other}"
            )));
        }
    };

    ensure_unique_ids(&operations)?;
    Ok(operations)
}

fn ensure_unique_ids(operations: &[QueuedOperation]) -> Result<(), QueueError> {
    let mut seen = HashSet::with_capacity(operations.len());
    for op in operations {
        if !seen.insert(&op.id) {
            return Err(QueueError::InvalidFormat(format!("duplicate id {}", op.id)));
        }
    }
    Ok(())
}
