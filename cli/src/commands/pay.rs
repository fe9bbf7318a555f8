//! `pay` — builds a `TransactionIntent` from the command line and runs
//! it through `engine::PendingTransactionEngine::create_pending_transaction`
//! (§4.2): an offline-signed, idempotent, queued transaction, or a
//! precondition error if the cached balance/amount/provisioning checks
//! fail.

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use uuid::Uuid;

use core::types::{Money, StandId, TransactionIntent, TransactionType, UserId, WalletId};
use engine::PendingTransactionEngine;

use crate::output;
use crate::runtime::{DeviceArgs, StoreArgs};

#[derive(Clone, Copy, ValueEnum)]
pub enum TxTypeArg {
    Purchase,
    Payment,
    Refund,
    Cancel,
}

impl From<TxTypeArg> for TransactionType {
    fn from(value: TxTypeArg) -> Self {
        match value {
            TxTypeArg::Purchase => Self::Purchase,
            TxTypeArg::Payment => Self::Payment,
            TxTypeArg::Refund => Self::Refund,
            TxTypeArg::Cancel => Self::Cancel,
        }
    }
}

#[derive(Args)]
pub struct PayArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub device: DeviceArgs,

    /// Wallet to debit (or credit, for a refund)
    #[arg(long)]
    pub wallet_id: Uuid,

    /// The wallet owner
    #[arg(long)]
    pub user_id: Uuid,

    /// Amount in the wallet's smallest currency unit
    #[arg(long)]
    pub amount: u64,

    /// Transaction type
    #[arg(long, value_enum, default_value = "purchase")]
    pub tx_type: TxTypeArg,

    /// Stand this transaction is at, if any
    #[arg(long)]
    pub stand_id: Option<Uuid>,

    /// Stand display name, for offline browsing
    #[arg(long)]
    pub stand_name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: PayArgs) -> Result<()> {
    let store = args.store.open_store().await?;
    let config = config::load_from_env()?;

    let engine = PendingTransactionEngine::new(store, args.device.device_id(), Some(config.device_key));

    let intent = TransactionIntent {
        wallet_id: WalletId(args.wallet_id),
        user_id: UserId(args.user_id),
        amount: Money(args.amount),
        tx_type: args.tx_type.into(),
        stand_id: args.stand_id.map(StandId),
        stand_name: args.stand_name,
        description: args.description,
        product_items: None,
    };

    let pending = engine.create_pending_transaction(intent).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    output::success(&format!("queued {} of {}", pending.tx_type, pending.amount));
    println!("  {:<18} {}", "transaction id:".dimmed(), pending.id.to_string().cyan());
    println!("  {:<18} {}", "idempotency key:".dimmed(), pending.idempotency_key.cyan());
    println!("  {:<18} {}", "signature:".dimmed(), pending.offline_signature.dimmed());

    Ok(())
}
