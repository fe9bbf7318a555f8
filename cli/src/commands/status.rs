//! `status` — a snapshot of the on-device store: schema version and the
//! §4.1 `stats()` counts by status, in human or JSON form.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::output;
use crate::runtime::StoreArgs;

#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let store = args.store.open_store().await?;
    let version = store::migrations::current_version(store.pool()).await?;
    let stats = store.stats().await?;

    if args.json {
        let output = serde_json::json!({
            "db": args.store.db.display().to_string(),
            "schema_version": version,
            "sync_queue": {
                "pending": stats.sync_queue_pending,
                "completed": stats.sync_queue_completed,
                "failed": stats.sync_queue_failed,
            },
            "pending_transactions": {
                "unsynced": stats.pending_transactions_unsynced,
                "synced": stats.pending_transactions_synced,
            },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    output::header("Offline Core Status");
    println!();
    println!("  {} {}", "db:".dimmed(), args.store.db.display().to_string().cyan());
    println!("  {} {}", "schema version:".dimmed(), version.to_string().cyan());
    println!();

    println!("{}", "Sync queue:".bold());
    println!("  {:<12} {}", "pending:", stats.sync_queue_pending.to_string().cyan());
    println!("  {:<12} {}", "completed:", stats.sync_queue_completed.to_string().cyan());
    println!("  {:<12} {}", "failed:", stats.sync_queue_failed.to_string().cyan());
    println!();

    println!("{}", "Pending transactions:".bold());
    println!("  {:<12} {}", "unsynced:", stats.pending_transactions_unsynced.to_string().cyan());
    println!("  {:<12} {}", "synced:", stats.pending_transactions_synced.to_string().cyan());

    Ok(())
}
