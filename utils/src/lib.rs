//! Hashing and idempotency-key utilities shared across the offline core.
//!
//! - Uses SHA-256 for content hashing
//! - Produces stable hex-encoded digests safe to store as opaque keys

use sha2::{Digest, Sha256};

use core::types::{DeviceId, Money, TransactionType, WalletId};

/// Compute a SHA-256 hex digest of arbitrary bytes.
///
/// # Examples
///
/// ```
/// let hash = utils::compute_content_hash(b"hello world");
/// assert_eq!(hash.len(), 64);
/// ```
#[must_use]
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// §4.2a: `idempotency_key := hash(device_id, wallet_id, amount, type,
/// created_at_ms, monotonic_counter)`.
///
/// Deterministic for a given set of inputs — the pending transaction
/// engine calls this exactly once per intent and stores the result on
/// the row; replays of that same row must reuse the stored key rather
/// than recomputing it, so the hash collision-avoidance the
/// `monotonic_counter` buys only matters at creation time.
#[must_use]
pub fn compute_idempotency_key(
    device_id: DeviceId,
    wallet_id: WalletId,
    amount: Money,
    tx_type: TransactionType,
    created_at_ms: i64,
    monotonic_counter: u64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(device_id.as_uuid().as_bytes());
    hasher.update(wallet_id.as_uuid().as_bytes());
    hasher.update(amount.0.to_be_bytes());
    hasher.update(tx_type.to_string().as_bytes());
    hasher.update(created_at_ms.to_be_bytes());
    hasher.update(monotonic_counter.to_be_bytes());
    hex::encode(hasher.finalize())
}
