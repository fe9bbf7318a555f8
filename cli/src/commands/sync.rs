//! `sync` — builds a `SyncQueue` over the on-device store, registers
//! the HTTP `pending_transaction` handler, and drains the queue with
//! `flush()` (§4.5 trigger 4, "explicit" sync).

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use sync::{PaymentHandler, SyncQueue, DEFAULT_HANDLER_DEADLINE};

use crate::output;
use crate::runtime::StoreArgs;

#[derive(Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Run a single dispatch pass instead of draining the whole queue
    #[arg(long)]
    pub once: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: SyncArgs) -> Result<()> {
    let store = args.store.open_store().await?;
    let config = config::load_from_env()?;

    let queue = SyncQueue::new(store, config.sync_batch_size as usize, config.sync_max_in_flight as usize);
    queue.register(
        core::types::ENTITY_TYPE_PENDING_TRANSACTION,
        Arc::new(PaymentHandler::new(&config.sync_base_url, DEFAULT_HANDLER_DEADLINE)),
    );

    let summary = if args.once { queue.dispatch().await? } else { queue.flush().await? };

    if args.json {
        let output = serde_json::json!({
            "started": summary.started,
            "completed": summary.completed,
            "retried": summary.retried,
            "failed": summary.failed,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    output::header("Sync");
    println!();
    println!("  {:<12} {}", "started:", summary.started.to_string().cyan());
    println!("  {:<12} {}", "completed:", summary.completed.to_string().green());
    println!("  {:<12} {}", "retried:", summary.retried.to_string().yellow());
    println!("  {:<12} {}", "failed:", summary.failed.to_string().red());

    if summary.is_empty() {
        output::hint("queue was already drained");
    }

    Ok(())
}
