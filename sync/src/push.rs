//! Passive push consumer (§4.6): keeps caches warm from the
//! authoritative push channel. The transport itself (websocket, SSE,
//! whatever the platform wires up) is out of scope — this module only
//! applies already-deserialized payloads to the local store, the same
//! way `applyServerStatsSnapshot`/`applyServerTransaction`/
//! `applyServerAlert` are described.
//!
//! Ground: the reference workspace's `sync::bridge` applies inbound
//! websocket frames to local caches with last-write-wins semantics;
//! this keeps that "apply, don't negotiate" shape but defers to the
//! §4.4 merge rule already encoded in each `store` CRUD function
//! (`wallets::set_balance` overwrites, `transactions::insert_or_ignore`
//! never mutates history).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use core::types::{CachedTransaction, Money, StandId, WalletId};
use errors::StoreError;
use store::Store;

use crate::events::SyncEvent;

/// `applyServerStatsSnapshot` payload: the server's authoritative view
/// of one wallet's balance as of `as_of`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletStatsSnapshot {
    pub wallet_id: WalletId,
    pub balance: Money,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// `applyServerAlert` payload: an operator-facing notice (low stock,
/// stand offline, fraud signal) with no corresponding cache table — it
/// is re-broadcast on the event bus rather than persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerAlert {
    pub stand_id: Option<StandId>,
    pub severity: AlertSeverity,
    pub message: String,
}

/// Applies pushed server state to the local store. Cheap to clone —
/// it's a handle around a [`Store`] and an event publisher.
#[derive(Clone)]
pub struct PushConsumer {
    store: Store,
    events: broadcast::Sender<SyncEvent>,
}

impl PushConsumer {
    #[must_use]
    pub fn new(store: Store, events: broadcast::Sender<SyncEvent>) -> Self {
        Self { store, events }
    }

    /// Builds a consumer sharing the given queue's store and event bus,
    /// so pushed state and dispatcher events are observable on one
    /// stream.
    #[must_use]
    pub fn for_queue(queue: &crate::queue::SyncQueue) -> Self {
        Self::new(queue.store(), queue.event_sender())
    }

    /// `applyServerStatsSnapshot(snapshot)` (§4.6): overwrites the
    /// cached wallet balance — `cached_wallet` is `ServerWins` (§4.4),
    /// so there is no local state to reconcile against.
    pub async fn apply_server_stats_snapshot(&self, snapshot: WalletStatsSnapshot) -> Result<(), StoreError> {
        store::wallets::set_balance(self.store.pool(), snapshot.wallet_id, snapshot.balance).await
    }

    /// `applyServerTransaction(tx)` (§4.6): inserts into transaction
    /// history, no-op if already present — `cached_transaction` is
    /// append-only merge-by-id (§4.4), so a duplicate push changes
    /// nothing.
    pub async fn apply_server_transaction(&self, tx: CachedTransaction) -> Result<(), StoreError> {
        store::transactions::insert_or_ignore(self.store.pool(), &tx).await
    }

    /// `applyServerAlert(alert)` (§4.6): there is no alert cache table
    /// to reconcile into, so this simply fans the alert out to local
    /// subscribers.
    pub fn apply_server_alert(&self, alert: ServerAlert) {
        let _ = self.events.send(SyncEvent::ServerAlert {
            stand_id: alert.stand_id,
            severity: alert.severity,
            message: alert.message,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::types::{CachedWallet, TransactionId, TransactionType, UserId};

    async fn test_store() -> Store {
        Store::in_memory().await.expect("in-memory store")
    }

    fn test_wallet(wallet_id: WalletId, balance: Money) -> CachedWallet {
        let now = Utc::now();
        CachedWallet {
            id: wallet_id,
            user_id: UserId::new(),
            balance,
            currency_name: "tokens".to_string(),
            exchange_rate: 1.0,
            qr_code: None,
            qr_expires_at: None,
            last_sync: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn stats_snapshot_overwrites_cached_balance() {
        let store = test_store().await;
        let wallet_id = WalletId::new();
        store::wallets::upsert(store.pool(), &test_wallet(wallet_id, Money(500))).await.unwrap();

        let (events, _rx) = broadcast::channel(8);
        let consumer = PushConsumer::new(store.clone(), events);
        consumer
            .apply_server_stats_snapshot(WalletStatsSnapshot { wallet_id, balance: Money(300), as_of: Utc::now() })
            .await
            .unwrap();

        let reloaded = store::wallets::get_by_id(store.pool(), wallet_id).await.unwrap().unwrap();
        assert_eq!(reloaded.balance, Money(300));
    }

    #[tokio::test]
    async fn duplicate_pushed_transaction_does_not_error() {
        let store = test_store().await;
        let wallet_id = WalletId::new();
        store::wallets::upsert(store.pool(), &test_wallet(wallet_id, Money(1_000))).await.unwrap();

        let tx = CachedTransaction {
            id: TransactionId::new(),
            wallet_id,
            amount: Money(200),
            tx_type: TransactionType::Purchase,
            balance_after: Money(800),
            created_at: Utc::now(),
        };

        let (events, _rx) = broadcast::channel(8);
        let consumer = PushConsumer::new(store.clone(), events);
        consumer.apply_server_transaction(tx.clone()).await.unwrap();
        consumer.apply_server_transaction(tx).await.unwrap();

        let history = store::transactions::list_by_wallet(store.pool(), wallet_id, 10, 0).await.unwrap();
        assert_eq!(history.len(), 1, "re-pushing the same transaction id must not duplicate history");
    }

    #[tokio::test]
    async fn alert_is_broadcast_to_subscribers() {
        let store = test_store().await;
        let (events, mut rx) = broadcast::channel(8);
        let consumer = PushConsumer::new(store, events);

        consumer.apply_server_alert(ServerAlert { stand_id: None, severity: AlertSeverity::Warning, message: "low stock".into() });

        let event = rx.try_recv().expect("alert should be published");
        assert!(matches!(event, SyncEvent::ServerAlert { severity: AlertSeverity::Warning, .. }));
    }
}
