//! Exercises `POST /api/v1/payments` end to end against the ingestion
//! stub, covering the §6 response codes a dispatcher handler must
//! branch on.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use tower::ServiceExt;

use config::DeviceKey;
use contract::state::AppState;
use core::types::{DeviceId, Money, TransactionId, TransactionType, UserId, WalletId};
use core::wire::{PaymentRequest, PaymentResponse};

fn signed_request(
    device_key: &DeviceKey,
    device_id: DeviceId,
    wallet_id: WalletId,
    user_id: UserId,
    amount: Money,
    idempotency_key: &str,
) -> PaymentRequest {
    let id = TransactionId::new();
    let created_at = Utc::now();
    let offline_signature = engine::signing::sign(
        device_key,
        id,
        wallet_id,
        user_id,
        amount,
        TransactionType::Purchase,
        None,
        idempotency_key,
        created_at,
    );

    PaymentRequest {
        id,
        wallet_id,
        amount,
        tx_type: TransactionType::Purchase,
        stand_id: None,
        product_items: Vec::new(),
        idempotency_key: idempotency_key.to_string(),
        offline_signature,
        device_id,
        created_at,
    }
}

async fn post_payment(state: AppState, req: &PaymentRequest) -> (StatusCode, serde_json::Value) {
    let router = contract::create_router(state);
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/payments")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(req).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn accepted_submission_debits_and_returns_201() {
    let state = AppState::new();
    let device_key = DeviceKey::from_bytes(vec![0x42; 32]);
    let device_id = DeviceId::new();
    let wallet_id = WalletId::new();
    let user_id = UserId::new();
    state.provision_device_key(device_id, device_key.as_bytes().to_vec());
    state.provision_wallet(wallet_id, user_id, Money(1_000));

    let req = signed_request(&device_key, device_id, wallet_id, user_id, Money(250), "idem-1");
    let (status, body) = post_payment(state.clone(), &req).await;

    assert_eq!(status, StatusCode::CREATED);
    let response: PaymentResponse = serde_json::from_value(body).unwrap();
    assert_eq!(response.balance_after, Money(750));
    assert_eq!(state.wallet(wallet_id).unwrap().balance, Money(750));
}

#[tokio::test]
async fn replayed_idempotency_key_returns_identical_response_without_double_debit() {
    let state = AppState::new();
    let device_key = DeviceKey::from_bytes(vec![0x42; 32]);
    let device_id = DeviceId::new();
    let wallet_id = WalletId::new();
    let user_id = UserId::new();
    state.provision_device_key(device_id, device_key.as_bytes().to_vec());
    state.provision_wallet(wallet_id, user_id, Money(1_000));

    let req = signed_request(&device_key, device_id, wallet_id, user_id, Money(250), "idem-2");
    let (first_status, first_body) = post_payment(state.clone(), &req).await;
    let (status, second_body) = post_payment(state.clone(), &req).await;

    assert_eq!(first_status, StatusCode::CREATED, "first submission is a new accept, not a replay");
    assert_eq!(status, StatusCode::OK, "replay is reserved for §6's idempotency-match branch");
    assert_eq!(first_body, second_body, "replay must return the exact original response");
    assert_eq!(state.wallet(wallet_id).unwrap().balance, Money(750), "balance must only be debited once");
}

#[tokio::test]
async fn insufficient_balance_rejects_with_402() {
    let state = AppState::new();
    let device_key = DeviceKey::from_bytes(vec![0x42; 32]);
    let device_id = DeviceId::new();
    let wallet_id = WalletId::new();
    let user_id = UserId::new();
    state.provision_device_key(device_id, device_key.as_bytes().to_vec());
    state.provision_wallet(wallet_id, user_id, Money(100));

    let req = signed_request(&device_key, device_id, wallet_id, user_id, Money(250), "idem-3");
    let (status, _) = post_payment(state, &req).await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn tampered_signature_rejects_with_400() {
    let state = AppState::new();
    let device_key = DeviceKey::from_bytes(vec![0x42; 32]);
    let device_id = DeviceId::new();
    let wallet_id = WalletId::new();
    let user_id = UserId::new();
    state.provision_device_key(device_id, device_key.as_bytes().to_vec());
    state.provision_wallet(wallet_id, user_id, Money(1_000));

    let mut req = signed_request(&device_key, device_id, wallet_id, user_id, Money(250), "idem-4");
    req.amount = Money(999);
    let (status, _) = post_payment(state, &req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unprovisioned_device_rejects_with_401() {
    let state = AppState::new();
    let device_key = DeviceKey::from_bytes(vec![0x42; 32]);
    let wallet_id = WalletId::new();
    let user_id = UserId::new();
    state.provision_wallet(wallet_id, user_id, Money(1_000));

    let req = signed_request(&device_key, DeviceId::new(), wallet_id, user_id, Money(250), "idem-5");
    let (status, _) = post_payment(state, &req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn same_idempotency_key_with_different_payload_rejects_with_409() {
    let state = AppState::new();
    let device_key = DeviceKey::from_bytes(vec![0x42; 32]);
    let device_id = DeviceId::new();
    let wallet_id = WalletId::new();
    let user_id = UserId::new();
    state.provision_device_key(device_id, device_key.as_bytes().to_vec());
    state.provision_wallet(wallet_id, user_id, Money(1_000));

    let first = signed_request(&device_key, device_id, wallet_id, user_id, Money(250), "idem-6");
    post_payment(state.clone(), &first).await;

    let second = signed_request(&device_key, device_id, wallet_id, user_id, Money(300), "idem-6");
    let (status, _) = post_payment(state, &second).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn zero_amount_rejects_with_400_before_touching_the_ledger() {
    let state = AppState::new();
    let device_key = DeviceKey::from_bytes(vec![0x42; 32]);
    let device_id = DeviceId::new();
    let wallet_id = WalletId::new();
    let user_id = UserId::new();
    state.provision_device_key(device_id, device_key.as_bytes().to_vec());
    state.provision_wallet(wallet_id, user_id, Money(1_000));

    let req = signed_request(&device_key, device_id, wallet_id, user_id, Money(0), "idem-7");
    let (status, _) = post_payment(state.clone(), &req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.wallet(wallet_id).unwrap().balance, Money(1_000));
}
