//! `queue` — inspect `sync_queue` rows beyond the `status` command's
//! aggregate counts: list what's actually `pending`/`failed` so an
//! operator can see what a `failed` item's last error was (§7
//! "User-visible behaviour": failed items keep their error for manual
//! retry/inspection).

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use colored::Colorize;

use core::types::QueueStatus;

use crate::output;
use crate::runtime::StoreArgs;

#[derive(Subcommand)]
pub enum QueueCommand {
    #[command(about = "List sync queue items in a given status")]
    List(ListArgs),
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Pending,
    Completed,
    Failed,
}

impl From<StatusArg> for QueueStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => Self::Pending,
            StatusArg::Completed => Self::Completed,
            StatusArg::Failed => Self::Failed,
        }
    }
}

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, value_enum, default_value = "failed")]
    pub status: StatusArg,

    #[arg(long, default_value_t = 20)]
    pub limit: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(cmd: QueueCommand) -> Result<()> {
    match cmd {
        QueueCommand::List(args) => list(args).await,
    }
}

async fn list(args: ListArgs) -> Result<()> {
    let store = args.store.open_store().await?;
    let status: QueueStatus = args.status.into();
    let items = store::sync_queue::list_by_status(store.pool(), status, args.limit).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    output::header(&format!("Sync Queue — {status}"));
    println!();

    if items.is_empty() {
        output::hint("nothing in this status");
        return Ok(());
    }

    for item in &items {
        println!(
            "  {} {} {} retries={}/{}",
            item.id.to_string().cyan(),
            item.entity_type.dimmed(),
            item.entity_id,
            item.retry_count,
            item.max_retries,
        );
        if let Some(error) = &item.error {
            println!("    {} {}", "error:".red(), error);
        }
    }

    Ok(())
}
