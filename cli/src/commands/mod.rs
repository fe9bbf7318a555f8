pub mod completion;
pub mod init;
pub mod pay;
pub mod queue;
pub mod status;
pub mod sync;
pub mod wallet;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "offline-core",
    author,
    version,
    about = "Operator CLI for the offline transaction and sync core",
    long_about = "Drives the on-device store directly: initialize it, record an offline \
                  purchase against it, dispatch its sync queue to a server, and inspect \
                  what's cached and what's still pending."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create and migrate the on-device store")]
    Init(init::InitArgs),

    #[command(about = "Show store and queue status")]
    Status(status::StatusArgs),

    #[command(about = "Record an offline purchase, payment, refund, or cancellation")]
    Pay(pay::PayArgs),

    #[command(about = "Dispatch the sync queue to the server")]
    Sync(sync::SyncArgs),

    #[command(subcommand, about = "Seed and inspect cached wallets")]
    Wallet(wallet::WalletCommand),

    #[command(subcommand, about = "Inspect the sync queue")]
    Queue(queue::QueueCommand),

    #[command(about = "Generate shell completions")]
    Completion(completion::CompletionArgs),
}
