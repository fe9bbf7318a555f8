//! HMAC-SHA256 offline signing (§4.2b). The signature covers the
//! canonical, sort-keyed encoding from `core::wire` so the server can
//! recompute and compare it byte-for-byte.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use config::DeviceKey;
use core::types::{Money, StandId, TransactionId, TransactionType, UserId, WalletId};
use core::wire::canonical_signing_bytes;

type HmacSha256 = Hmac<Sha256>;

/// Computes `offline_signature := HMAC-SHA256(device_key,
/// canonical(...))`, hex-encoded.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn sign(
    device_key: &DeviceKey,
    id: TransactionId,
    wallet_id: WalletId,
    user_id: UserId,
    amount: Money,
    tx_type: TransactionType,
    stand_id: Option<StandId>,
    idempotency_key: &str,
    created_at: DateTime<Utc>,
) -> String {
    let payload = canonical_signing_bytes(id, wallet_id, user_id, amount, tx_type, stand_id, idempotency_key, created_at);

    let mut mac =
        HmacSha256::new_from_slice(device_key.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(&payload);
    hex::encode(mac.finalize().into_bytes())
}
