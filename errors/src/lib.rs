//! # Offline Core Errors
//!
//! Error taxonomy shared across the offline transaction and sync core.
//!
//! - Uses `thiserror` for structured error definitions
//! - Named fields instead of positional ones, so messages stay readable
//!   as variants grow
//! - Each crate's own error enum converts into this taxonomy at its
//!   boundary via `#[from]` rather than leaking crate-internal error
//!   types upward

use thiserror::Error;

/// Store-layer errors (§4.1).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("store corrupt: {reason}")]
    StoreCorrupt { reason: String },

    #[error("migration {version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("store busy: {reason}")]
    StoreBusy { reason: String },

    #[error("not found: {entity_type}:{id}")]
    NotFound { entity_type: String, id: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

/// Pending transaction engine errors (§4.2).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("device not provisioned")]
    DeviceNotProvisioned,

    #[error("insufficient balance: have {available}, need {requested}")]
    InsufficientBalance { available: u64, requested: u64 },

    #[error("invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Transport/server outcome categories (§4.3).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("server error {status}: {reason}")]
    Server5xx { status: u16, reason: String },

    #[error("client error {status}: {reason}")]
    Client4xx { status: u16, reason: String },

    #[error("auth error: {reason}")]
    Auth { reason: String },

    #[error("rate limited, retry after {retry_after_secs:?}s")]
    RateLimit { retry_after_secs: Option<u64> },

    #[error("conflict: {reason}")]
    Conflict { reason: String },

    #[error("validation error: {reason}")]
    Validation { reason: String },

    #[error("permanent monetary rejection: {reason}")]
    PermanentMonetaryRejection { reason: String },

    #[error("unknown error: {reason}")]
    Unknown { reason: String },
}

/// Conflict resolution errors (§4.4).
#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("no resolution strategy registered for entity type: {entity_type}")]
    NoStrategy { entity_type: String },

    #[error("conflict requires manual resolution: {conflict_id}")]
    ManualRequired { conflict_id: String },

    #[error("conflict unresolvable: {reason}")]
    Unresolvable { reason: String },
}

/// Sync queue errors (§4.5).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no handler registered for entity type: {entity_type}")]
    NoHandler { entity_type: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("queue shutting down")]
    ShuttingDown,
}

/// Configuration loading/validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {name}")]
    MissingEnv { name: String },

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}
