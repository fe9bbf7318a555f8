//! Shared state for the ingestion stub: an in-memory wallet ledger,
//! provisioned device keys, and an idempotency-key cache.
//!
//! Grounded on `opal-fetcher::state::AppState` (a `Clone` struct
//! wrapping connection state behind `Arc`/a concurrent map) — here
//! there is no real database, since the stub's only job is to exercise
//! the wire contract against a realistic in-memory ledger.

use dashmap::DashMap;

use core::types::{DeviceId, Money, UserId, WalletId};
use core::wire::PaymentResponse;

/// What the stub knows about one wallet: enough to recompute the
/// canonical signing bytes (which include `user_id`, not present on the
/// wire body itself) and to apply/reject a debit.
#[derive(Debug, Clone, Copy)]
pub struct WalletRecord {
    pub user_id: UserId,
    pub balance: Money,
}

/// A previously-accepted submission, kept so a retransmission with the
/// same idempotency key replays the original response instead of
/// re-applying the debit (§6: "200 with same body when the idempotency
/// key matches a prior successful submission").
#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    pub payload_hash: String,
    pub response: PaymentResponse,
}

/// Shared, clonable handle to the stub's in-memory state.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    wallets: std::sync::Arc<DashMap<WalletId, WalletRecord>>,
    device_keys: std::sync::Arc<DashMap<DeviceId, Vec<u8>>>,
    submissions: std::sync::Arc<DashMap<String, RecordedSubmission>>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provision_wallet(&self, wallet_id: WalletId, user_id: UserId, balance: Money) {
        self.wallets.insert(wallet_id, WalletRecord { user_id, balance });
    }

    pub fn provision_device_key(&self, device_id: DeviceId, key: Vec<u8>) {
        self.device_keys.insert(device_id, key);
    }

    #[must_use]
    pub fn wallet(&self, wallet_id: WalletId) -> Option<WalletRecord> {
        self.wallets.get(&wallet_id).map(|entry| *entry.value())
    }

    #[must_use]
    pub fn device_key(&self, device_id: DeviceId) -> Option<Vec<u8>> {
        self.device_keys.get(&device_id).map(|entry| entry.value().clone())
    }

    pub fn set_balance(&self, wallet_id: WalletId, balance: Money) {
        if let Some(mut entry) = self.wallets.get_mut(&wallet_id) {
            entry.balance = balance;
        }
    }

    #[must_use]
    pub fn find_submission(&self, idempotency_key: &str) -> Option<RecordedSubmission> {
        self.submissions.get(idempotency_key).map(|entry| entry.value().clone())
    }

    pub fn record_submission(&self, idempotency_key: String, submission: RecordedSubmission) {
        self.submissions.insert(idempotency_key, submission);
    }
}
