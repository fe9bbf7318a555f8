//! The single ingestion endpoint the stub exists to exercise:
//! `POST /api/v1/payments` (§6).
//!
//! Ground: `opal-fetcher::handlers::health`/`get_hierarchy` for the
//! `State<AppState>` + `Result<Json<T>, Error>` handler shape; the
//! validation-order-matters structure is this crate's own, since the
//! reference workspace has no equivalent monetary endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use core::wire::{PaymentRequest, PaymentResponse};

use crate::error::{ContractError, Result};
use crate::signing;
use crate::state::{AppState, RecordedSubmission};

/// Validation order mirrors §6's own ordering of response codes
/// (`400`s first, then `401`, then the monetary `402`, then `409`):
/// 1. amount/product-item validity
/// 2. idempotency replay — a prior response is served verbatim before
///    any other check runs again, so a retried submission never gets a
///    different verdict the second time around
/// 3. device key lookup / signature verification
/// 4. wallet existence
/// 5. balance sufficiency
///
/// §6: a brand-new accepted submission returns `201`; `200` is reserved
/// for the idempotency-replay branch (a retransmission of a submission
/// already recorded under the same key).
pub async fn create_payment(
    State(state): State<AppState>,
    Json(req): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>)> {
    validate_amount(&req)?;

    let payload_bytes = serde_json::to_vec(&req).map_err(|e| ContractError::Internal(e.to_string()))?;
    let payload_hash = signing::hash_payload(&payload_bytes);

    if let Some(prior) = state.find_submission(&req.idempotency_key) {
        if prior.payload_hash == payload_hash {
            return Ok((StatusCode::OK, Json(prior.response)));
        }
        return Err(ContractError::DuplicateWithDifferentPayload);
    }

    let device_key = state.device_key(req.device_id).ok_or_else(|| ContractError::Auth("device not provisioned".to_string()))?;

    let wallet = state.wallet(req.wallet_id).ok_or_else(|| ContractError::Validation("unknown wallet".to_string()))?;

    let signature_valid = signing::verify(
        &device_key,
        req.id,
        req.wallet_id,
        wallet.user_id,
        req.amount,
        req.tx_type,
        req.stand_id,
        &req.idempotency_key,
        req.created_at,
        &req.offline_signature,
    );
    if !signature_valid {
        return Err(ContractError::InvalidSignature);
    }

    let balance_after = if req.tx_type.debits_balance() {
        wallet.balance.checked_sub(req.amount).ok_or(ContractError::InsufficientBalance {
            available: wallet.balance.0,
            requested: req.amount.0,
        })?
    } else {
        wallet.balance
    };

    state.set_balance(req.wallet_id, balance_after);

    let response = PaymentResponse { transaction_id: req.id, balance_after };
    state.record_submission(req.idempotency_key.clone(), RecordedSubmission { payload_hash, response: response.clone() });

    Ok((StatusCode::CREATED, Json(response)))
}

fn validate_amount(req: &PaymentRequest) -> Result<()> {
    if req.amount == core::types::Money::ZERO {
        return Err(ContractError::InvalidAmount("amount must be greater than zero".to_string()));
    }
    if !req.product_items.is_empty() {
        let total = req.product_items.iter().try_fold(core::types::Money::ZERO, |acc, item| {
            let subtotal = u64::from(item.quantity)
                .checked_mul(item.unit_price.0)
                .map(core::types::Money)
                .ok_or_else(|| ContractError::Validation(format!("product item {} quantity*unit_price overflows", item.product_id)))?;
            acc.checked_add(subtotal).ok_or_else(|| ContractError::Validation("product item total overflows".to_string()))
        })?;
        if total != req.amount {
            return Err(ContractError::Validation(format!(
                "amount {} does not match product item total {total}",
                req.amount
            )));
        }
    }
    Ok(())
}
