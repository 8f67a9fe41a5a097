use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use outbound_core::app::{QueueBuilder, SyncLoop};
use outbound_core::config::QueueConfig;
use outbound_core::domain::{
    EntityKind, ExecutorError, OperationId, OperationKind, QueueEvent, QueuedOperation,
};
use outbound_core::impls::FileStorage;
use outbound_core::ports::OperationExecutor;
use outbound_core::queue::OfflineQueue;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "outbound", about = "Inspect and drive a file-backed offline operation queue")]
struct Cli {
    /// Directory the queue snapshot is stored in.
    #[arg(long, default_value = ".outbound")]
    data_dir: PathBuf,

    /// Optional TOML file with queue settings (max_size, max_retries, ...).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Buffer a new operation.
    Enqueue {
        kind: KindArg,
        entity: EntityArg,
        /// JSON payload.
        #[arg(default_value = "{}")]
        payload: String,
    },
    /// Show counts by status.
    Status,
    /// List operations.
    List {
        #[arg(long)]
        entity: Option<EntityArg>,
        #[arg(long, conflicts_with = "pending")]
        failed: bool,
        #[arg(long)]
        pending: bool,
    },
    /// Replay pending operations against a simulated remote.
    Drain {
        /// Make the first N remote calls fail.
        #[arg(long, default_value_t = 0)]
        fail_first: u32,
    },
    /// Drain in the background every `interval_ms` for `duration_secs`.
    Sync {
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
        #[arg(long, default_value_t = 3)]
        duration_secs: u64,
        #[arg(long, default_value_t = 0)]
        fail_first: u32,
    },
    /// Reset a Failed operation to Pending.
    Retry { id: String },
    /// Reset every Failed operation to Pending.
    RetryFailed,
    /// Remove one operation.
    Remove { id: String },
    /// Remove Completed operations.
    ClearCompleted,
    /// Remove everything.
    Clear,
    /// Write the queue as JSON to a file (or stdout).
    Export { path: Option<PathBuf> },
    /// Replace the queue with a previously exported file.
    Import { path: PathBuf },
    /// Size of the persisted snapshot in bytes.
    Size,
}

impl Command {
    fn mutates(&self) -> bool {
        !matches!(
            self,
            Command::Status | Command::List { .. } | Command::Export { .. } | Command::Size
        )
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Create,
    Update,
    Delete,
}

impl From<KindArg> for OperationKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Create => OperationKind::Create,
            KindArg::Update => OperationKind::Update,
            KindArg::Delete => OperationKind::Delete,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum EntityArg {
    Workout,
    Achievement,
    Dashboard,
}

impl From<EntityArg> for EntityKind {
    fn from(arg: EntityArg) -> Self {
        match arg {
            EntityArg::Workout => EntityKind::Workout,
            EntityArg::Achievement => EntityKind::Achievement,
            EntityArg::Dashboard => EntityKind::Dashboard,
        }
    }
}

/// 擬似リモート：最初の N 回は失敗する
struct SimulatedRemote {
    remaining_failures: AtomicU32,
}

impl SimulatedRemote {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl OperationExecutor for SimulatedRemote {
    async fn execute(&self, operation: &QueuedOperation) -> Result<(), ExecutorError> {
        if let Ok(left) =
            self.remaining_failures
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        {
            return Err(ExecutorError::new(format!(
                "simulated remote unavailable (left={left})"
            )));
        }

        println!(
            "replayed {} {} {}",
            operation.kind, operation.entity, operation.id
        );
        Ok(())
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<QueueConfig> {
    let Some(path) = path else {
        return Ok(QueueConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn log_events(queue: &OfflineQueue) {
    queue.subscribe_all(|event| match event {
        QueueEvent::OperationFailed(op) => {
            info!(op_id = %op.id, error = ?op.last_error, "operation gave up");
        }
        QueueEvent::OperationRetry(op) => {
            info!(op_id = %op.id, retry_count = op.retry_count, "operation will retry");
        }
        _ => {}
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    // (A) file-backed queue を用意して前回のスナップショットを読み込む
    let queue = Arc::new(
        QueueBuilder::new(Arc::new(FileStorage::new(cli.data_dir.clone())))
            .config(config)
            .build()?,
    );
    queue.initialize().await;
    log_events(&queue);

    let mutates = cli.command.mutates();
    match cli.command {
        Command::Enqueue {
            kind,
            entity,
            payload,
        } => {
            let payload: serde_json::Value =
                serde_json::from_str(&payload).context("payload must be JSON")?;
            let id = queue.enqueue(kind.into(), entity.into(), payload).await?;
            println!("{id}");
        }
        Command::Status => print_json(&queue.status().await)?,
        Command::List {
            entity,
            failed,
            pending,
        } => {
            let mut ops = if failed {
                queue.failed_operations().await
            } else if pending {
                queue.pending_operations().await
            } else {
                queue.operations().await
            };
            if let Some(entity) = entity {
                let entity = EntityKind::from(entity);
                ops.retain(|op| op.entity == entity);
            }
            print_json(&ops)?;
        }
        Command::Drain { fail_first } => {
            let report = queue
                .process_queue(&SimulatedRemote::new(fail_first))
                .await;
            print_json(&report)?;
        }
        Command::Sync {
            interval_ms,
            duration_secs,
            fail_first,
        } => {
            // (B) バックグラウンドで drain を回し、一定時間後に止める
            let sync = SyncLoop::spawn(
                Arc::clone(&queue),
                Arc::new(SimulatedRemote::new(fail_first)),
                Duration::from_millis(interval_ms),
            );
            tokio::time::sleep(Duration::from_secs(duration_secs)).await;
            sync.shutdown_and_join().await;
            print_json(&queue.status().await)?;
        }
        Command::Retry { id } => queue.retry_operation(&OperationId::new(id)).await?,
        Command::RetryFailed => println!("{}", queue.retry_all_failed().await),
        Command::Remove { id } => {
            let removed = queue.remove_operation(&OperationId::new(id)).await?;
            print_json(&removed)?;
        }
        Command::ClearCompleted => println!("{}", queue.clear_completed().await),
        Command::Clear => queue.clear_all().await,
        Command::Export { path } => {
            let exported = queue.export_queue().await?;
            match path {
                Some(path) => std::fs::write(&path, exported)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{exported}"),
            }
        }
        Command::Import { path } => {
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let count = queue.import_queue(&data).await?;
            println!("{count}");
        }
        Command::Size => println!("{}", queue.queue_size().await),
    }

    // 書き込み失敗はログだけで流れるので、終了前にもう一度書いて結果を確認する
    if mutates {
        queue
            .flush()
            .await
            .with_context(|| format!("saving queue to {}", cli.data_dir.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn op() -> QueuedOperation {
        QueuedOperation::new(
            OperationId::new("op-1"),
            OperationKind::Update,
            EntityKind::Workout,
            serde_json::json!({}),
            Utc::now(),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn simulated_remote_fails_exactly_n_times_under_concurrency() {
        let remote = Arc::new(SimulatedRemote::new(3));

        let calls: Vec<_> = (0..16)
            .map(|_| {
                let remote = Arc::clone(&remote);
                tokio::spawn(async move { remote.execute(&op()).await.is_err() })
            })
            .collect();

        let mut failures = 0;
        for call in calls {
            if call.await.unwrap() {
                failures += 1;
            }
        }
        assert_eq!(failures, 3);
        assert_eq!(remote.remaining_failures.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn only_read_commands_skip_the_final_save() {
        assert!(!Command::Status.mutates());
        assert!(!Command::Size.mutates());
        assert!(!Command::Export { path: None }.mutates());
        assert!(Command::Clear.mutates());
        assert!(Command::Drain { fail_first: 0 }.mutates());
    }
}
