//! Read-only views handed to consumers (UI, logging).

use serde::{Deserialize, Serialize};

/// Counts by status, computed by scanning the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Result of one `process_queue` call.
///
/// Only operations that reached Completed / Failed during *this* drain are
/// counted. An operation that failed but still has retries left is in neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub completed: usize,
    pub failed: usize,
}

impl DrainReport {
    /// Nothing changed state (also what a skipped, overlapping drain returns).
    pub fn is_empty(&self) -> bool {
        self.completed == 0 && self.failed == 0
    }
}
