//! Operator CLI for the offline transaction and sync core.
//!
//! This binary does not replace a mobile client or POS station — it
//! drives the same `engine`/`sync`/`store` crates those would embed,
//! for local development, demos, and operator inspection of an
//! on-device database.

mod commands;
mod output;
mod runtime;

use anyhow::Result;
use clap::Parser;
use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init(args) => commands::init::run(args).await,
        Commands::Status(args) => commands::status::run(args).await,
        Commands::Pay(args) => commands::pay::run(args).await,
        Commands::Sync(args) => commands::sync::run(args).await,
        Commands::Wallet(cmd) => commands::wallet::run(cmd).await,
        Commands::Queue(cmd) => commands::queue::run(cmd).await,
        Commands::Completion(args) => commands::completion::run(args),
    };

    if let Err(err) = &result {
        output::error(&err.to_string());
    }
    result
}
