//! Drain: replay Pending operations through an executor.
//!
//! # フロー（1 operation ごと）
//! 1. Pending -> Processing にして永続化
//! 2. ロックを外して executor を実行（ネットワーク I/O があり得る）
//! 3. 結果で状態を更新して永続化
//!    - 成功: Completed
//!    - 失敗: retry_count += 1。上限に達したら Failed、そうでなければ Pending
//!      （同じ drain の中では再実行しない）
//! 4. ロックを持ったまま発火枠（EmitPermit）を取り、ロックを外してから発火
//!
//! 全件処理したら、24 時間より古い Completed を掃除して永続化する。

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use super::OfflineQueue;
use crate::domain::{DrainReport, OperationStatus, QueueEvent};
use crate::ports::OperationExecutor;

/// Single-flight flag holder. Dropping it (normal return, panic unwinding, or
/// the drain future being dropped) clears the flag.
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl OfflineQueue {
    /// Is a drain currently running?
    pub fn is_processing(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Drain every Pending operation, in FIFO order, through `executor`.
    ///
    /// If another drain is already running this returns an empty report
    /// immediately. Executor errors never escape: they are recorded on the
    /// operation. The returned counts only cover operations that became
    /// Completed or Failed during this call.
    pub async fn process_queue<E>(&self, executor: &E) -> DrainReport
    where
        E: OperationExecutor + ?Sized,
    {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            debug!("drain already in progress; skipping");
            return DrainReport::default();
        };

        let mut report = DrainReport::default();

        let pending = {
            let mut state = self.state.lock().await;
            // Nothing can legitimately be Processing while we hold the flag:
            // leftovers come from an abandoned drain.
            let recovered = state.recover_interrupted();
            if recovered > 0 {
                warn!(recovered, "operations left in Processing reset to Pending");
                self.persist(&state).await;
            }
            state.pending_ids()
        };

        if !pending.is_empty() {
            info!(pending = pending.len(), "draining offline queue");
        }

        for id in pending {
            let op = {
                let mut state = self.state.lock().await;
                // removed / retried / cleared since the drain started
                let Some(op) = state.get_mut(&id) else {
                    continue;
                };
                if !op.status.is_runnable() {
                    continue;
                }
                op.start_processing();
                let op = op.clone();
                self.persist(&state).await;
                op
            };

            debug!(op_id = %id, kind = %op.kind, entity = %op.entity, "executing operation");
            let result = executor.execute(&op).await;

            let (event, permit) = {
                let mut state = self.state.lock().await;
                let Some(current) = state.get_mut(&id) else {
                    warn!(op_id = %id, "operation removed while executing; result dropped");
                    continue;
                };

                let event = match result {
                    Ok(()) => {
                        current.mark_completed();
                        report.completed += 1;
                        debug!(op_id = %id, "operation completed");
                        QueueEvent::OperationCompleted(current.clone())
                    }
                    Err(err) => {
                        let status = self.retry_policy.apply_failure(current, err.into_message());
                        if status == OperationStatus::Failed {
                            report.failed += 1;
                            warn!(
                                op_id = %id,
                                retry_count = current.retry_count,
                                error = current.last_error.as_deref().unwrap_or_default(),
                                "operation failed permanently"
                            );
                            QueueEvent::OperationFailed(current.clone())
                        } else {
                            debug!(
                                op_id = %id,
                                retry_count = current.retry_count,
                                "operation failed; will retry on next drain"
                            );
                            QueueEvent::OperationRetry(current.clone())
                        }
                    }
                };
                self.persist(&state).await;
                (event, self.notifier.reserve())
            };

            permit.emit(&event);
        }

        self.cleanup().await;

        if !report.is_empty() {
            info!(completed = report.completed, failed = report.failed, "drain finished");
        }
        report
    }

    /// Evict Completed operations older than the configured TTL and persist.
    async fn cleanup(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let evicted = match now.checked_sub_signed(self.config.completed_ttl()) {
            Some(cutoff) => state.evict_stale_completed(cutoff),
            None => 0,
        };
        if evicted > 0 {
            debug!(evicted, "stale completed operations evicted");
        }
        self.persist(&state).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_single_flight_and_released_on_drop() {
        let flag = AtomicBool::new(false);

        let first = DrainGuard::acquire(&flag);
        assert!(first.is_some());
        assert!(DrainGuard::acquire(&flag).is_none());

        drop(first);
        assert!(!flag.load(Ordering::Acquire));
        assert!(DrainGuard::acquire(&flag).is_some());
    }
}
