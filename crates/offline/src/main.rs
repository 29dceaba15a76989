use std::sync::Arc;

use clap::{Parser, Subcommand};
use offline::{
    EntityRef, EntityType, HttpBackend, JsonFileStore, NewOperation, OfflineQueue, OperationKind,
    Result, SyncReport,
    settings::{self, ConfigArgs},
};

#[derive(Debug, Parser)]
#[command(name = "travelmind_sync", about = "Inspect and replay the offline mutation queue")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show queue state and every queued operation.
    Status,
    /// Replay pending operations against the server.
    Sync,
    /// Give failed operations a fresh retry budget and replay.
    RetryFailed,
    /// Drop completed operations.
    ClearCompleted,
    /// Drop every queued operation.
    ClearAll,
    /// Record a mutation without sending it.
    Enqueue {
        #[arg(long, value_enum)]
        kind: OperationKind,
        #[arg(long, value_enum)]
        entity: EntityType,
        /// Server id or `tmp-…` handle; for creates, the handle to use.
        #[arg(long)]
        target: Option<EntityRef>,
        /// Trip the diary entry or place belongs to.
        #[arg(long)]
        parent: Option<EntityRef>,
        /// JSON body sent to the server.
        #[arg(long, default_value = "null")]
        payload: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = settings::load(cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "travelmind_sync={level},offline={level}",
            level = settings.level
        ))
        .init();

    let store = JsonFileStore::open(&settings.queue_path)?;
    let backend = HttpBackend::new(&settings.base_url)?;
    let queue = OfflineQueue::builder()
        .store(Arc::new(store))
        .backend(Arc::new(backend))
        .policy(settings.policy())
        .build()?;
    queue.recover()?;

    match cli.command {
        Command::Status => print_status(&queue)?,
        Command::Sync => print_report(queue.process_queue().await?),
        Command::RetryFailed => print_report(queue.retry_failed().await?),
        Command::ClearCompleted => println!("removed {}", queue.clear_completed()?),
        Command::ClearAll => println!("removed {}", queue.clear_all()?),
        Command::Enqueue {
            kind,
            entity,
            target,
            parent,
            payload,
        } => {
            let op = queue.enqueue(NewOperation {
                kind,
                entity,
                target,
                parent,
                payload: serde_json::from_str(&payload)?,
            })?;
            println!("#{} {} {}", op.seq, op.id, op.target);
        }
    }

    Ok(())
}

fn print_status(queue: &OfflineQueue) -> Result<()> {
    let counts = queue.counts()?;
    println!("{}", serde_json::to_string(&queue.queue_state()?)?);
    println!(
        "pending {} | syncing {} | completed {} | failed {}",
        counts.pending, counts.syncing, counts.completed, counts.failed
    );
    for op in queue.operations()? {
        println!(
            "#{:<4} {:<9} {:?} {:?} {} retries={}{}",
            op.seq,
            op.status,
            op.kind,
            op.entity,
            op.target,
            op.retry_count,
            op.last_error
                .as_deref()
                .map(|err| format!(" error={err}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn print_report(report: Option<SyncReport>) {
    match report {
        Some(report) => println!(
            "succeeded {} | failed {} | retried {}",
            report.succeeded, report.failed, report.retried
        ),
        None => println!("nothing done: offline or a run is already in flight"),
    }
}
