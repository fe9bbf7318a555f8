//! Drives the real dispatch path — `SyncQueue` + `PaymentHandler` —
//! against a live `contract::create_router` server for the
//! accept/replay/rejection scenarios, and against a `wiremock` double
//! for the timeout-then-recover scenario. This is the one place those
//! four pieces are exercised together rather than in isolation.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use contract::state::AppState;
use core::types::{
    CachedWallet, DeviceId, Money, Priority, QueueItemId, QueueOperation, QueueStatus,
    SyncQueueItem, TransactionIntent, TransactionType, UserId, WalletId,
    ENTITY_TYPE_PENDING_TRANSACTION,
};
use core::wire::{PaymentRequest, PaymentResponse};
use engine::PendingTransactionEngine;
use store::Store;
use sync::{PaymentHandler, SyncEvent, SyncQueue, DEFAULT_HANDLER_DEADLINE};
use testing::fixtures;

/// Binds an ephemeral port and serves the ingestion stub on a detached
/// background task for the rest of the test's lifetime.
async fn spawn_contract_server(state: AppState) -> String {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("listener has a local addr");
    let router = contract::create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("ingestion stub server crashed");
    });
    format!("http://{addr}")
}

/// Pulls a queue item's `next_attempt` into the past so the next
/// `dispatch()` pass picks it straight back up, instead of the test
/// actually sleeping out `RetryPolicy::CRITICAL`'s backoff.
async fn force_due_now(pool: &sqlx::SqlitePool, entity_id: &str) {
    sqlx::query("UPDATE sync_queue SET next_attempt = ? WHERE entity_id = ?")
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(entity_id)
        .execute(pool)
        .await
        .expect("forcing a queue item due now should never fail");
}

struct Fixture {
    store: Store,
    wallet_id: WalletId,
    user_id: UserId,
    device_id: DeviceId,
    contract_state: AppState,
}

/// A store with one cached wallet at `balance`, and a `contract::AppState`
/// provisioned with the same wallet and device key so a dispatched
/// payment can round-trip against it.
async fn setup(balance: Money) -> Fixture {
    let store = fixtures::in_memory_store().await;
    let wallet_id = WalletId::new();
    let user_id = UserId::new();
    let device_id = fixtures::fixed_device_id();

    let wallet = CachedWallet { id: wallet_id, user_id, ..fixtures::sample_wallet(balance) };
    fixtures::seed_wallet(&store, wallet).await;

    let contract_state = AppState::new();
    contract_state.provision_wallet(wallet_id, user_id, balance);
    contract_state.provision_device_key(device_id, fixtures::fixed_device_key().as_bytes().to_vec());

    Fixture { store, wallet_id, user_id, device_id, contract_state }
}

fn purchase_intent(wallet_id: WalletId, user_id: UserId, amount: Money) -> TransactionIntent {
    TransactionIntent {
        wallet_id,
        user_id,
        amount,
        tx_type: TransactionType::Purchase,
        stand_id: None,
        stand_name: None,
        description: None,
        product_items: None,
    }
}

#[tokio::test]
async fn s1_dispatch_completes_a_queued_purchase_and_caches_its_transaction() {
    let fixture = setup(Money(1_000)).await;
    let base_url = spawn_contract_server(fixture.contract_state.clone()).await;

    let engine = PendingTransactionEngine::new(fixture.store.clone(), fixture.device_id, Some(fixtures::fixed_device_key()));
    let tx = engine.create_pending_transaction(purchase_intent(fixture.wallet_id, fixture.user_id, Money(250))).await.unwrap();

    let queue = SyncQueue::new(fixture.store.clone(), 10, 4);
    queue.register(ENTITY_TYPE_PENDING_TRANSACTION, Arc::new(PaymentHandler::new(&base_url, DEFAULT_HANDLER_DEADLINE)));

    let summary = queue.dispatch().await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.retried, 0);
    assert_eq!(summary.failed, 0);

    let pending = store::pending_transactions::get_by_id(fixture.store.pool(), tx.id).await.unwrap().unwrap();
    assert!(pending.synced);

    let wallet = store::wallets::get_by_id(fixture.store.pool(), fixture.wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance, Money(750), "local speculative debit matches the server's own debit");

    let cached = store::transactions::list_by_wallet(fixture.store.pool(), fixture.wallet_id, 10, 0).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, tx.id);
}

#[tokio::test]
async fn s2_replayed_queue_item_does_not_double_debit_or_double_insert() {
    let fixture = setup(Money(1_000)).await;
    let base_url = spawn_contract_server(fixture.contract_state.clone()).await;

    let engine = PendingTransactionEngine::new(fixture.store.clone(), fixture.device_id, Some(fixtures::fixed_device_key()));
    let tx = engine.create_pending_transaction(purchase_intent(fixture.wallet_id, fixture.user_id, Money(250))).await.unwrap();

    let queue = SyncQueue::new(fixture.store.clone(), 10, 4);
    queue.register(ENTITY_TYPE_PENDING_TRANSACTION, Arc::new(PaymentHandler::new(&base_url, DEFAULT_HANDLER_DEADLINE)));

    let first = queue.dispatch().await.unwrap();
    assert_eq!(first.completed, 1);

    // A second queue item for the same pending transaction, as if an
    // app restart re-enqueued it without knowing the first attempt
    // already landed. Same payload, same idempotency key.
    let replay = SyncQueueItem {
        id: QueueItemId::new(),
        operation: QueueOperation::Create,
        entity_type: ENTITY_TYPE_PENDING_TRANSACTION.to_string(),
        entity_id: tx.id.to_string(),
        payload: serde_json::to_value(&tx).unwrap(),
        priority: Priority::High,
        retry_count: 0,
        max_retries: 10,
        created_at: chrono::Utc::now(),
        last_attempt: None,
        next_attempt: None,
        error: None,
        status: QueueStatus::Pending,
    };
    queue.enqueue(replay).await.unwrap();

    let second = queue.dispatch().await.unwrap();
    assert_eq!(second.completed, 1, "the server's idempotency replay still acks as a completion");

    let wallet = store::wallets::get_by_id(fixture.store.pool(), fixture.wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance, Money(750), "a replayed submission must not debit a second time");

    let cached = store::transactions::list_by_wallet(fixture.store.pool(), fixture.wallet_id, 10, 0).await.unwrap();
    assert_eq!(cached.len(), 1, "insert_or_ignore keeps cached history from duplicating on replay");
}

#[tokio::test]
async fn s3_server_side_402_reverses_the_speculative_debit_and_emits_payment_rejected() {
    let fixture = setup(Money(1_000)).await;
    // The server's view of the balance has since diverged lower than
    // what the client speculatively debited against (§4.4).
    fixture.contract_state.set_balance(fixture.wallet_id, Money(100));
    let base_url = spawn_contract_server(fixture.contract_state.clone()).await;

    let engine = PendingTransactionEngine::new(fixture.store.clone(), fixture.device_id, Some(fixtures::fixed_device_key()));
    let tx = engine.create_pending_transaction(purchase_intent(fixture.wallet_id, fixture.user_id, Money(250))).await.unwrap();

    let wallet_after_local_debit = store::wallets::get_by_id(fixture.store.pool(), fixture.wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet_after_local_debit.balance, Money(750));

    let queue = SyncQueue::new(fixture.store.clone(), 10, 4);
    queue.register(ENTITY_TYPE_PENDING_TRANSACTION, Arc::new(PaymentHandler::new(&base_url, DEFAULT_HANDLER_DEADLINE)));
    let mut events = queue.subscribe();

    let summary = queue.dispatch().await.unwrap();
    assert_eq!(summary.completed, 1, "a rejected payment is a resolved outcome, not a retryable failure");

    let wallet = store::wallets::get_by_id(fixture.store.pool(), fixture.wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.balance, Money(100), "the speculative debit must revert to the server-reported balance");

    let pending = store::pending_transactions::get_by_id(fixture.store.pool(), tx.id).await.unwrap().unwrap();
    assert!(pending.synced);
    assert!(pending.error.is_some());

    let mut rejected = None;
    while rejected.is_none() {
        let Ok(Ok(event)) = tokio::time::timeout(Duration::from_millis(500), events.recv()).await else { break };
        if matches!(event, SyncEvent::PaymentRejected { .. }) {
            rejected = Some(event);
        }
    }
    match rejected.expect("PaymentRejected must be published on a ServerAuthoritative rejection") {
        SyncEvent::PaymentRejected { pending_transaction_id, wallet_id, balance_after, .. } => {
            assert_eq!(pending_transaction_id, tx.id);
            assert_eq!(wallet_id, fixture.wallet_id);
            assert_eq!(balance_after, Money(100));
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn s4_three_timeouts_then_success_eventually_completes() {
    let fixture = setup(Money(1_000)).await;
    let engine = PendingTransactionEngine::new(fixture.store.clone(), fixture.device_id, Some(fixtures::fixed_device_key()));
    let tx = engine.create_pending_transaction(purchase_intent(fixture.wallet_id, fixture.user_id, Money(250))).await.unwrap();

    let mock_server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_in_responder = Arc::clone(&attempts);
    Mock::given(method("POST"))
        .and(path("/api/v1/payments"))
        .respond_with(move |request: &wiremock::Request| {
            let attempt = attempts_in_responder.fetch_add(1, Ordering::SeqCst);
            if attempt < 3 {
                return ResponseTemplate::new(201).set_delay(Duration::from_millis(400));
            }
            let req: PaymentRequest =
                serde_json::from_slice(&request.body).expect("handler always posts a valid PaymentRequest");
            let body = PaymentResponse { transaction_id: req.id, balance_after: Money(750) };
            ResponseTemplate::new(201).set_body_json(body)
        })
        .mount(&mock_server)
        .await;

    let queue = SyncQueue::new(fixture.store.clone(), 10, 4);
    queue.register(
        ENTITY_TYPE_PENDING_TRANSACTION,
        Arc::new(PaymentHandler::new(&mock_server.uri(), Duration::from_millis(100))),
    );

    for attempt in 0..3 {
        let summary = queue.dispatch().await.unwrap();
        assert_eq!(summary.retried, 1, "attempt {attempt} should time out and schedule a retry");
        force_due_now(fixture.store.pool(), &tx.id.to_string()).await;
    }

    let summary = queue.dispatch().await.unwrap();
    assert_eq!(summary.completed, 1, "the fourth attempt succeeds once the server responds promptly");
    assert_eq!(attempts.load(Ordering::SeqCst), 4);

    let completed = store::sync_queue::list_by_status(fixture.store.pool(), QueueStatus::Completed, 10).await.unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].retry_count, 3, "three retries were recorded before the eventual success");
}

