//! `wallet` — seed and inspect `cached_wallets` rows directly, since
//! this core has no server to push a real wallet snapshot from in a
//! standalone demo.

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use colored::Colorize;
use uuid::Uuid;

use core::types::{CachedWallet, Money, UserId, WalletId};

use crate::output;
use crate::runtime::StoreArgs;

#[derive(Subcommand)]
pub enum WalletCommand {
    #[command(about = "Upsert a cached wallet row")]
    Seed(SeedArgs),

    #[command(about = "Show a cached wallet by id or owning user")]
    Show(ShowArgs),
}

#[derive(Args)]
pub struct SeedArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub wallet_id: Option<Uuid>,

    #[arg(long)]
    pub user_id: Uuid,

    #[arg(long)]
    pub balance: u64,

    #[arg(long, default_value = "USD")]
    pub currency_name: String,

    #[arg(long, default_value_t = 1.0)]
    pub exchange_rate: f64,
}

#[derive(Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, conflicts_with = "user_id")]
    pub wallet_id: Option<Uuid>,

    #[arg(long)]
    pub user_id: Option<Uuid>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(cmd: WalletCommand) -> Result<()> {
    match cmd {
        WalletCommand::Seed(args) => seed(args).await,
        WalletCommand::Show(args) => show(args).await,
    }
}

async fn seed(args: SeedArgs) -> Result<()> {
    let store = args.store.open_store().await?;
    let now = Utc::now();

    let wallet = CachedWallet {
        id: args.wallet_id.map(WalletId).unwrap_or_default(),
        user_id: UserId(args.user_id),
        balance: Money(args.balance),
        currency_name: args.currency_name,
        exchange_rate: args.exchange_rate,
        qr_code: None,
        qr_expires_at: None,
        last_sync: now,
        created_at: now,
        updated_at: now,
    };

    store::wallets::upsert(store.pool(), &wallet).await?;

    output::success(&format!("seeded wallet {} for user {}", wallet.id, wallet.user_id));
    println!("  {:<10} {}", "balance:", wallet.balance.0.to_string().cyan());

    Ok(())
}

async fn show(args: ShowArgs) -> Result<()> {
    let store = args.store.open_store().await?;

    let wallet = match (args.wallet_id, args.user_id) {
        (Some(id), _) => store::wallets::get_by_id(store.pool(), WalletId(id)).await?,
        (None, Some(user_id)) => store::wallets::get_by_user(store.pool(), UserId(user_id)).await?,
        (None, None) => bail!("pass either --wallet-id or --user-id"),
    };

    let Some(wallet) = wallet else {
        output::warn("no matching cached wallet");
        return Ok(());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&wallet)?);
        return Ok(());
    }

    output::header("Cached Wallet");
    println!();
    println!("  {:<16} {}", "id:", wallet.id.to_string().cyan());
    println!("  {:<16} {}", "user:", wallet.user_id.to_string().cyan());
    println!("  {:<16} {} {}", "balance:", wallet.balance.0.to_string().green(), wallet.currency_name);
    println!("  {:<16} {}", "exchange rate:", wallet.exchange_rate);
    println!("  {:<16} {}", "last sync:", wallet.last_sync.to_rfc3339());

    Ok(())
}
