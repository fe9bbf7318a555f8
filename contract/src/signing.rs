//! Server-side verification of the offline HMAC signature (§6).
//!
//! Mirrors `engine::signing::sign` exactly — same canonical bytes, same
//! `Hmac<Sha256>` — since a signature is only useful if both sides
//! derive it identically. Kept as its own small module (rather than a
//! shared dependency on `engine`) so the stub never carries a live
//! device's signing capability, only verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use core::types::{Money, StandId, TransactionId, TransactionType, UserId, WalletId};
use core::wire::canonical_signing_bytes;

type HmacSha256 = Hmac<Sha256>;

#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn verify(
    device_key: &[u8],
    id: TransactionId,
    wallet_id: WalletId,
    user_id: UserId,
    amount: Money,
    tx_type: TransactionType,
    stand_id: Option<StandId>,
    idempotency_key: &str,
    created_at: chrono::DateTime<chrono::Utc>,
    signature_hex: &str,
) -> bool {
    let Ok(expected_bytes) = hex::decode(signature_hex) else { return false };
    let bytes = canonical_signing_bytes(id, wallet_id, user_id, amount, tx_type, stand_id, idempotency_key, created_at);
    let Ok(mut mac) = HmacSha256::new_from_slice(device_key) else { return false };
    mac.update(&bytes);
    mac.verify_slice(&expected_bytes).is_ok()
}

#[must_use]
pub fn hash_payload(bytes: &[u8]) -> String {
    utils::compute_content_hash(bytes)
}
