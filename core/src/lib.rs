//! # Offline Core — Shared Types
//!
//! Domain types and wire DTOs shared by every crate in the offline
//! transaction and sync core. Nothing here touches I/O: this crate is
//! the vocabulary the rest of the workspace speaks.

pub mod types;
pub mod wire;

#[cfg(test)]
mod proptests;

pub use types::{
    CachedProduct, CachedStand, CachedTransaction, CachedWallet, DeviceId, Money,
    MonotonicMillis, PendingTransaction, Priority, ProductId, ProductItem, QueueItemId,
    QueueOperation, QueueStatus, SchemaMigration, StandId, StandType, TransactionId,
    TransactionIntent, TransactionType, UserId, WalletId,
};
