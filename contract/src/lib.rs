//! # Contract
//!
//! A reference stub for the server-side ingestion contract (§6): just
//! enough of `POST /api/v1/payments` — idempotency replay, signature
//! verification, balance enforcement — to drive the sync dispatcher's
//! handler against realistic wire behavior in tests, without standing
//! up the real platform backend (explicitly out of scope, §1).

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod signing;
pub mod state;

pub use error::ContractError;
pub use routes::create_router;
pub use state::AppState;
