//! Errors the ingestion stub returns, mapped onto the §6 response codes.
//!
//! Grounded on `opal-fetcher::error::FetcherError`: a `thiserror` enum
//! plus an `IntoResponse` impl that picks the status code and a
//! serialisable body from the variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use core::wire::{PaymentErrorBody, PaymentErrorCode};

pub type Result<T> = std::result::Result<T, ContractError>;

/// One ingestion outcome per §6's response table, modelled as an error
/// type so handlers can use `?` for every non-`201`/`200` path.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: u64, requested: u64 },

    #[error("duplicate idempotency key with a different payload")]
    DuplicateWithDifferentPayload,

    #[error("rate limited")]
    RateLimited { retry_after_secs: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ContractError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::InvalidAmount(msg) => (StatusCode::BAD_REQUEST, PaymentErrorCode::InvalidAmount, msg.clone()),
            Self::InvalidSignature => {
                (StatusCode::BAD_REQUEST, PaymentErrorCode::InvalidSignature, "signature does not match payload".to_string())
            }
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, PaymentErrorCode::ValidationError, msg.clone()),
            Self::Auth(msg) => (StatusCode::UNAUTHORIZED, PaymentErrorCode::Auth, msg.clone()),
            Self::InsufficientBalance { available, requested } => (
                StatusCode::PAYMENT_REQUIRED,
                PaymentErrorCode::InsufficientBalance,
                format!("available {available}, requested {requested}"),
            ),
            Self::DuplicateWithDifferentPayload => (
                StatusCode::CONFLICT,
                PaymentErrorCode::DuplicateWithDifferentPayload,
                "idempotency key reused with a different payload".to_string(),
            ),
            Self::RateLimited { retry_after_secs } => {
                let body = PaymentErrorBody { code: PaymentErrorCode::ValidationError, message: "rate limited".to_string() };
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [("Retry-After", retry_after_secs.to_string())],
                    Json(body),
                )
                    .into_response();
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error in ingestion stub");
                (StatusCode::INTERNAL_SERVER_ERROR, PaymentErrorCode::ValidationError, "internal error".to_string())
            }
        };

        (status, Json(PaymentErrorBody { code, message })).into_response()
    }
}
