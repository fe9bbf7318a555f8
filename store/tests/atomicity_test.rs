use chrono::Utc;

use core::types::{
    CachedWallet, Money, Priority, QueueItemId, QueueOperation, QueueStatus, SyncQueueItem, TransactionId,
    TransactionType, UserId, WalletId,
};
use store::Store;

fn sample_wallet(id: WalletId, balance: Money) -> CachedWallet {
    let now = Utc::now();
    CachedWallet {
        id,
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
async fn transaction_rolls_back_fully_on_failure() {
    let store = Store::in_memory().await.unwrap();
    let wallet_id = WalletId::new();
    store::wallets::upsert(store.pool(), &sample_wallet(wallet_id, Money(1000))).await.unwrap();

    let queue_item = SyncQueueItem {
        id: QueueItemId::new(),
        operation: QueueOperation::Create,
        entity_type: "pending_transaction".to_string(),
        entity_id: TransactionId::new().to_string(),
        payload: serde_json::json!({}),
        priority: Priority::High,
        retry_count: 0,
        max_retries: 10,
        created_at: Utc::now(),
        last_attempt: None,
        next_attempt: None,
        error: None,
        status: QueueStatus::Pending,
    };

    let result: Result<(), errors::StoreError> = store
        .transaction(|tx| {
            Box::pin(async move {
                store::wallets::set_balance(&mut **tx, wallet_id, Money(750)).await?;
                store::sync_queue::insert(&mut **tx, &queue_item).await?;
                Err(errors::StoreError::StoreBusy { reason: "simulated crash".to_string() })
            })
        })
        .await;

    assert!(result.is_err());

    let wallet = store::wallets::get_by_id(store.pool(), wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance, Money(1000), "balance must be unchanged after rollback");

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.sync_queue_pending, 0, "queue item must not exist after rollback");
}

#[tokio::test]
async fn transaction_commits_all_writes_together() {
    let store = Store::in_memory().await.unwrap();
    let wallet_id = WalletId::new();
    store::wallets::upsert(store.pool(), &sample_wallet(wallet_id, Money(1000))).await.unwrap();

    let queue_item_id = QueueItemId::new();
    let queue_item = SyncQueueItem {
        id: queue_item_id,
        operation: QueueOperation::Create,
        entity_type: "pending_transaction".to_string(),
        entity_id: TransactionId::new().to_string(),
        payload: serde_json::json!({"amount": 250}),
        priority: Priority::High,
        retry_count: 0,
        max_retries: 10,
        created_at: Utc::now(),
        last_attempt: None,
        next_attempt: None,
        error: None,
        status: QueueStatus::Pending,
    };

    store
        .transaction(|tx| {
            Box::pin(async move {
                store::wallets::set_balance(&mut **tx, wallet_id, Money(750)).await?;
                store::sync_queue::insert(&mut **tx, &queue_item).await
            })
        })
        .await
        .unwrap();

    let wallet = store::wallets::get_by_id(store.pool(), wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance, Money(750));

    let item = store::sync_queue::get_by_id(store.pool(), queue_item_id).await.unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Pending);
    assert_eq!(item.priority, Priority::High);
}

#[tokio::test]
async fn cached_transaction_insert_is_idempotent() {
    let store = Store::in_memory().await.unwrap();
    let wallet_id = WalletId::new();
    store::wallets::upsert(store.pool(), &sample_wallet(wallet_id, Money(1000))).await.unwrap();

    let row = core::types::CachedTransaction {
        id: TransactionId::new(),
        wallet_id,
        amount: Money(250),
        tx_type: TransactionType::Purchase,
        balance_after: Money(750),
        created_at: Utc::now(),
    };

    store::transactions::insert_or_ignore(store.pool(), &row).await.unwrap();
    // Second insert with a different balance_after must be a no-op: the
    // first-written snapshot wins (§8 round-trip law).
    let mut second = row.clone();
    second.balance_after = Money(999);
    store::transactions::insert_or_ignore(store.pool(), &second).await.unwrap();

    let rows = store::transactions::list_by_wallet(store.pool(), wallet_id, 10, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].balance_after, Money(750));
}

#[tokio::test]
async fn pending_transaction_idempotency_key_is_unique_per_device() {
    let store = Store::in_memory().await.unwrap();
    let wallet_id = WalletId::new();
    store::wallets::upsert(store.pool(), &sample_wallet(wallet_id, Money(1000))).await.unwrap();

    let device_id = core::types::DeviceId::new();
    let row = core::types::PendingTransaction {
        id: TransactionId::new(),
        wallet_id,
        user_id: UserId::new(),
        amount: Money(250),
        tx_type: TransactionType::Purchase,
        stand_id: None,
        stand_name: None,
        description: None,
        product_items: None,
        idempotency_key: "stable-key-1".to_string(),
        offline_signature: "deadbeef".to_string(),
        device_id,
        created_at: Utc::now(),
        synced: false,
        retry_count: 0,
        last_retry_at: None,
        error: None,
    };

    store::pending_transactions::insert(store.pool(), &row).await.unwrap();

    let mut replay = row.clone();
    replay.id = TransactionId::new();
    let result = store::pending_transactions::insert(store.pool(), &replay).await;
    assert!(result.is_err(), "a second row with the same (device_id, idempotency_key) must be rejected");

    let existing = store::pending_transactions::get_by_idempotency_key(store.pool(), device_id, "stable-key-1")
        .await
        .unwrap()
        .expect("original row should still be retrievable");
    assert_eq!(existing.id, row.id);
}
