//! `init` — creates the on-device database file (if absent) and runs
//! every pending migration, matching §4.1's "forward-only" migration
//! model: there is nothing else to set up, since the store's schema
//! *is* the initialization.

use anyhow::Result;
use clap::Args;

use crate::output;
use crate::runtime::StoreArgs;

#[derive(Args)]
pub struct InitArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

pub async fn run(args: InitArgs) -> Result<()> {
    let store = args.store.open_store().await?;
    let version = store::migrations::current_version(store.pool()).await?;

    output::success(&format!("store ready at {} (schema version {version})", args.store.db.display()));
    Ok(())
}
