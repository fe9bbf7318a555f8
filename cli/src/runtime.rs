//! Setup shared by every subcommand that touches the on-device store or
//! the provisioned device identity.
//!
//! Grounded on `cli/src/offline.rs`'s `OfflineConfig` (db path plus
//! device/user identifiers resolved once, passed down to whichever
//! client method runs) — simplified to clap-parsed flags/env vars since
//! this CLI has no `.aeterna/context.toml` equivalent to read from.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use core::types::DeviceId;
use store::Store;

/// Flags shared by every subcommand that opens the local store.
#[derive(Args, Clone)]
pub struct StoreArgs {
    /// Path to the on-device SQLite database.
    #[arg(long, env = "OFFLINE_CORE_DB", default_value = "offline-core.sqlite3")]
    pub db: PathBuf,
}

impl StoreArgs {
    pub async fn open_store(&self) -> Result<Store> {
        let path = self.db.to_str().context("--db path must be valid UTF-8")?;
        Store::open(path).await.with_context(|| format!("failed to open store at {}", self.db.display()))
    }
}

/// Flags a subcommand needs when it acts on behalf of a specific device
/// (signing or dispatching that device's pending transactions).
#[derive(Args, Clone)]
pub struct DeviceArgs {
    /// This device's id (a UUID), provisioned out of band.
    #[arg(long, env = "DEVICE_ID")]
    pub device_id: Uuid,
}

impl DeviceArgs {
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        DeviceId(self.device_id)
    }
}
