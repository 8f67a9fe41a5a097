//! SyncLoop - バックグラウンドで定期的に drain する
//!
//! # フロー
//! 1. interval ごと、または `trigger()`（接続回復など）で起きる
//! 2. `process_queue` を 1 回実行（single-flight なので重複しない）
//! 3. shutdown が来ていたら抜ける

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::ports::OperationExecutor;
use crate::queue::OfflineQueue;

/// Background drain driver handle.
/// - `trigger()` で即座に drain を要求できる
/// - `shutdown_and_join()` で停止を待てる
pub struct SyncLoop {
    shutdown_tx: watch::Sender<bool>,
    trigger: Arc<Notify>,
    join: JoinHandle<()>,
}

impl SyncLoop {
    /// Spawn the loop on the current tokio runtime. The first drain runs
    /// immediately.
    pub fn spawn(
        queue: Arc<OfflineQueue>,
        executor: Arc<dyn OperationExecutor>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let trigger = Arc::new(Notify::new());

        let join = tokio::spawn(sync_loop(
            queue,
            executor,
            interval,
            Arc::clone(&trigger),
            shutdown_rx,
        ));

        Self {
            shutdown_tx,
            trigger,
            join,
        }
    }

    /// Drain as soon as possible (e.g. connectivity came back).
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Stop taking new drains. A drain already running is not cancelled.
    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn sync_loop(
    queue: Arc<OfflineQueue>,
    executor: Arc<dyn OperationExecutor>,
    interval: Duration,
    trigger: Arc<Notify>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender が drop されたら止まる
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
            _ = trigger.notified() => {
                debug!("drain triggered");
            }
        }

        let report = queue.process_queue(executor.as_ref()).await;
        if !report.is_empty() {
            info!(
                completed = report.completed,
                failed = report.failed,
                "background drain finished"
            );
        }
    }

    debug!("sync loop stopped");
}
