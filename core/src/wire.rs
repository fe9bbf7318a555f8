//! Client ↔ server wire format (§6).
//!
//! The canonical signed bytes and the `POST /api/v1/payments` request
//! body live here so the signer (`engine`) and the dispatch handler
//! (`sync`) agree on exactly one representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    DeviceId, Money, PendingTransaction, ProductId, StandId, TransactionId, TransactionType,
    WalletId,
};

/// One product line item as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireProductItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// `POST /api/v1/payments` request body (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub amount: Money,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub stand_id: Option<StandId>,
    #[serde(default)]
    pub product_items: Vec<WireProductItem>,
    pub idempotency_key: String,
    pub offline_signature: String,
    pub device_id: DeviceId,
    pub created_at: DateTime<Utc>,
}

impl PaymentRequest {
    #[must_use]
    pub fn from_pending(tx: &PendingTransaction) -> Self {
        Self {
            id: tx.id,
            wallet_id: tx.wallet_id,
            amount: tx.amount,
            tx_type: tx.tx_type,
            stand_id: tx.stand_id,
            product_items: tx
                .product_items
                .as_ref()
                .map(|items| {
                    items
                        .iter()
                        .map(|item| WireProductItem {
                            product_id: item.product_id,
                            quantity: item.quantity,
                            unit_price: item.unit_price,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            idempotency_key: tx.idempotency_key.clone(),
            offline_signature: tx.offline_signature.clone(),
            device_id: tx.device_id,
            created_at: tx.created_at,
        }
    }
}

/// `201`/`200` success response body (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub transaction_id: TransactionId,
    pub balance_after: Money,
}

/// Permanent-error response codes named in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentErrorCode {
    InvalidAmount,
    InvalidSignature,
    ValidationError,
    Auth,
    InsufficientBalance,
    DuplicateWithDifferentPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentErrorBody {
    pub code: PaymentErrorCode,
    pub message: String,
}

/// Fields signed per §6: `{id, wallet_id, user_id, amount, type,
/// stand_id, idempotency_key, created_at}`, serialised as compact JSON
/// with keys sorted ascending and integers un-quoted.
///
/// `serde_json::Value::Object` is backed by a `BTreeMap` unless the
/// `preserve_order` feature is enabled (it isn't, workspace-wide), so a
/// plain `serde_json::to_vec` already yields ascending key order — no
/// manual sorting needed.
#[must_use]
pub fn canonical_signing_bytes(
    id: TransactionId,
    wallet_id: WalletId,
    user_id: crate::types::UserId,
    amount: Money,
    tx_type: TransactionType,
    stand_id: Option<StandId>,
    idempotency_key: &str,
    created_at: DateTime<Utc>,
) -> Vec<u8> {
    let fields = serde_json::json!({
        "id": id,
        "wallet_id": wallet_id,
        "user_id": user_id,
        "amount": amount,
        "type": tx_type,
        "stand_id": stand_id,
        "idempotency_key": idempotency_key,
        "created_at": created_at.to_rfc3339(),
    });
    serde_json::to_vec(&fields).expect("canonical fields are always serializable")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    #[test]
    fn canonical_bytes_are_deterministic_and_sorted() {
        let id = TransactionId::new();
        let wallet_id = WalletId::new();
        let user_id = UserId::new();
        let created_at = Utc::now();

        let a = canonical_signing_bytes(
            id,
            wallet_id,
            user_id,
            Money(250),
            TransactionType::Purchase,
            None,
            "key-1",
            created_at,
        );
        let b = canonical_signing_bytes(
            id,
            wallet_id,
            user_id,
            Money(250),
            TransactionType::Purchase,
            None,
            "key-1",
            created_at,
        );
        assert_eq!(a, b);

        let text = String::from_utf8(a).unwrap();
        assert!(!text.contains(' '));
        let amount_pos = text.find("\"amount\"").unwrap();
        let id_pos = text.find("\"id\"").unwrap();
        assert!(amount_pos < id_pos, "keys must be sorted ascending");
    }
}
