//! # Pending Transaction Engine
//!
//! Turns a user intent ("pay N from wallet W at stand S") into a
//! durable, signed, idempotent [`PendingTransaction`] row and a queued
//! sync operation — atomically (§4.2).

pub mod signing;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use config::DeviceKey;
use core::types::{
    DeviceId, Money, PendingTransaction, Priority, ProductItem, QueueItemId, QueueOperation,
    QueueStatus, SyncQueueItem, TransactionId, TransactionIntent, ENTITY_TYPE_PENDING_TRANSACTION,
};
use errors::{EngineError, StoreError};
use store::Store;

/// §4.2's `max_retries=10` for monetary sync-queue items.
const PENDING_TRANSACTION_MAX_RETRIES: u32 = 10;

/// Constructs offline-signed, idempotent pending transactions and
/// enqueues their sync work within one store transaction (§4.2, §5's
/// "key atomicity invariant": the debit, the insert, and the enqueue
/// commit or roll back together).
pub struct PendingTransactionEngine {
    store: Store,
    device_id: DeviceId,
    device_key: Option<DeviceKey>,
    monotonic_counter: AtomicU64,
}

impl PendingTransactionEngine {
    #[must_use]
    pub fn new(store: Store, device_id: DeviceId, device_key: Option<DeviceKey>) -> Self {
        Self { store, device_id, device_key, monotonic_counter: AtomicU64::new(0) }
    }

    /// `createPendingTransaction(intent) → PendingTransaction | Error` (§4.2).
    ///
    /// Preconditions are checked in the order §4.2 lists them: cached
    /// balance, amount validity, then device provisioning. Only once
    /// all three pass does the engine touch the store.
    #[tracing::instrument(skip(self, intent), fields(wallet_id = %intent.wallet_id, amount = intent.amount.0))]
    pub async fn create_pending_transaction(
        &self,
        intent: TransactionIntent,
    ) -> Result<PendingTransaction, EngineError> {
        let wallet = store::wallets::get_by_id(self.store.pool(), intent.wallet_id).await?;

        if intent.tx_type.debits_balance() {
            let available = wallet.as_ref().map_or(Money::ZERO, |w| w.balance);
            if available < intent.amount {
                return Err(EngineError::InsufficientBalance {
                    available: available.0,
                    requested: intent.amount.0,
                });
            }
        }

        if intent.amount == Money::ZERO {
            return Err(EngineError::InvalidAmount {
                reason: "amount must be greater than zero".to_string(),
            });
        }
        if let Some(items) = &intent.product_items {
            let total = sum_product_items(items)?;
            if total != intent.amount {
                return Err(EngineError::InvalidAmount {
                    reason: format!(
                        "amount {} does not match product item total {total}",
                        intent.amount
                    ),
                });
            }
        }

        let device_key = self.device_key.as_ref().ok_or(EngineError::DeviceNotProvisioned)?;

        let id = TransactionId::new();
        let created_at = Utc::now();
        let counter = self.monotonic_counter.fetch_add(1, Ordering::Relaxed);
        let idempotency_key = utils::compute_idempotency_key(
            self.device_id,
            intent.wallet_id,
            intent.amount,
            intent.tx_type,
            created_at.timestamp_millis(),
            counter,
        );
        let offline_signature = signing::sign(
            device_key,
            id,
            intent.wallet_id,
            intent.user_id,
            intent.amount,
            intent.tx_type,
            intent.stand_id,
            &idempotency_key,
            created_at,
        );

        let row = PendingTransaction {
            id,
            wallet_id: intent.wallet_id,
            user_id: intent.user_id,
            amount: intent.amount,
            tx_type: intent.tx_type,
            stand_id: intent.stand_id,
            stand_name: intent.stand_name.clone(),
            description: intent.description.clone(),
            product_items: intent.product_items.clone(),
            idempotency_key,
            offline_signature,
            device_id: self.device_id,
            created_at,
            synced: false,
            retry_count: 0,
            last_retry_at: None,
            error: None,
        };

        let payload = serde_json::to_value(&row)
            .map_err(|e| EngineError::Store(StoreError::Serialization { reason: e.to_string() }))?;
        let queue_item = SyncQueueItem {
            id: QueueItemId::new(),
            operation: QueueOperation::Create,
            entity_type: ENTITY_TYPE_PENDING_TRANSACTION.to_string(),
            entity_id: id.to_string(),
            payload,
            priority: Priority::High,
            retry_count: 0,
            max_retries: PENDING_TRANSACTION_MAX_RETRIES,
            created_at,
            last_attempt: None,
            next_attempt: None,
            error: None,
            status: QueueStatus::Pending,
        };

        let debit = if intent.tx_type.debits_balance() {
            let wallet = wallet.expect("balance check above already confirmed the wallet is cached");
            let new_balance = wallet
                .balance
                .checked_sub(intent.amount)
                .expect("balance check above already confirmed sufficient funds");
            Some((wallet.id, new_balance))
        } else {
            None
        };

        let row_for_store = row.clone();
        self.store
            .transaction(move |tx| {
                let row = row_for_store.clone();
                let queue_item = queue_item.clone();
                Box::pin(async move {
                    if let Some((wallet_id, new_balance)) = debit {
                        store::wallets::set_balance(&mut **tx, wallet_id, new_balance).await?;
                    }
                    store::pending_transactions::insert(&mut **tx, &row).await?;
                    store::sync_queue::insert(&mut **tx, &queue_item).await?;
                    Ok(())
                })
            })
            .await?;

        tracing::info!(transaction_id = %row.id, "pending transaction created");
        Ok(row)
    }
}

/// §4.2 precondition 2: `amount == Σ quantity·unit_price` when
/// `product_items` is present.
fn sum_product_items(items: &[ProductItem]) -> Result<Money, EngineError> {
    items.iter().try_fold(Money::ZERO, |acc, item| {
        let subtotal = item.subtotal().ok_or_else(|| EngineError::InvalidAmount {
            reason: format!("product item {} quantity*unit_price overflows", item.product_id),
        })?;
        acc.checked_add(subtotal)
            .ok_or_else(|| EngineError::InvalidAmount { reason: "product item total overflows".to_string() })
    })
}
