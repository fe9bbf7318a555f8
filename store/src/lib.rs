//! # Local Durable Store
//!
//! ACID persistence for all offline state (§4.1) over SQLite via
//! `sqlx`. This is the only crate in the workspace that issues SQL —
//! every other component reaches it through [`Store`].

pub mod migrations;
pub mod pending_transactions;
pub mod products;
pub mod stands;
mod store;
pub mod sync_queue;
pub mod transactions;
mod util;
pub mod wallets;

pub use migrations::{Migration, MigrationRecord};
pub use store::{BoxFuture, Store, StoreStats};
