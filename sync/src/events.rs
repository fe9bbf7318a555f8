//! Sync queue event stream (§4.5 `events`).
//!
//! Ground: the reference workspace's `sync::events` module defines
//! `#[serde]`-tagged event enums consumed by a websocket bridge; this
//! keeps the tagged-enum shape but publishes over a `tokio::sync::broadcast`
//! channel instead, since the push transport itself is out of scope (§1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core::types::{Money, QueueItemId, TransactionId, WalletId};

use crate::conflict::ConflictType;

/// The observable stream named in §4.5: `{enqueued, started, completed,
/// retried, failed, drained}`, plus the monetary `PaymentRejected`
/// event §4.4's `ServerAuthoritative` resolution must emit and a
/// `ManualConflictDetected` event for the `Manual` resolution path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    Enqueued { item_id: QueueItemId, entity_type: String, entity_id: String, timestamp: DateTime<Utc> },
    Started { item_id: QueueItemId, entity_type: String, attempt: u32, timestamp: DateTime<Utc> },
    Completed { item_id: QueueItemId, entity_type: String, timestamp: DateTime<Utc> },
    Retried { item_id: QueueItemId, entity_type: String, retry_count: u32, next_attempt: DateTime<Utc>, reason: String },
    Failed { item_id: QueueItemId, entity_type: String, reason: String, timestamp: DateTime<Utc> },
    /// Emitted once a `dispatch()`/`flush()` pass finds nothing left to do.
    Drained { timestamp: DateTime<Utc> },
    /// §4.4's mandatory monetary invariant on `ServerAuthoritative`
    /// rejection of a PURCHASE/PAYMENT.
    PaymentRejected {
        pending_transaction_id: TransactionId,
        wallet_id: WalletId,
        balance_after: Money,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    ManualConflictDetected {
        item_id: QueueItemId,
        entity_type: String,
        conflict_type: ConflictType,
        timestamp: DateTime<Utc>,
    },
    /// Re-broadcast of an `applyServerAlert` push (§4.6) so any local
    /// subscriber (UI, operator tooling) sees it the same way it sees
    /// dispatcher events, without the push consumer needing its own bus.
    ServerAlert {
        stand_id: Option<core::types::StandId>,
        severity: crate::push::AlertSeverity,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Default channel capacity for the broadcast bus; slow/absent
/// subscribers simply miss old events rather than back-pressuring the
/// dispatcher (the queue's durable state is in the store, not the bus).
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;
