//! # Sync
//!
//! The online half of the offline-first core (§4.3–§4.6): classifies
//! dispatch failures, resolves conflicts, and drives the durable
//! priority queue that carries local mutations to the server and
//! applies server pushes back.

pub mod conflict;
pub mod events;
pub mod http;
pub mod push;
pub mod queue;
pub mod retry;

pub use conflict::{ConflictResolver, ConflictType, ResolutionStrategy, ServerAuthoritativeDetail};
pub use events::{SyncEvent, DEFAULT_EVENT_CHANNEL_CAPACITY};
pub use http::PaymentHandler;
pub use push::{AlertSeverity, PushConsumer, ServerAlert, WalletStatsSnapshot};
pub use queue::{AckDetail, DispatchSummary, Handler, HandlerOutcome, SyncQueue, DEFAULT_HANDLER_DEADLINE};
pub use retry::{classify, next_delay, ErrorCategory, RetryPolicy};
