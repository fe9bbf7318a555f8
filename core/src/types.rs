use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_newtype!(DeviceId);
uuid_newtype!(WalletId);
uuid_newtype!(UserId);
uuid_newtype!(StandId);
uuid_newtype!(ProductId);
uuid_newtype!(TransactionId);
uuid_newtype!(QueueItemId);

/// A non-negative amount in the smallest currency unit (cents / tokens).
///
/// Arithmetic is checked: a speculative debit that would drive a
/// balance negative returns `None` rather than wrapping, enforcing
/// Testable Property 6 (balance non-negativity) at the type level in
/// addition to the store transaction check in `store`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub u64);

impl Money {
    pub const ZERO: Money = Money(0);

    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// In-memory ordering timestamp, distinct from the RFC3339 wire
/// timestamp — used wherever the store needs a monotonic-compatible
/// comparison (e.g. idempotency key derivation) rather than a
/// wall-clock string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonotonicMillis(pub i64);

impl MonotonicMillis {
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Purchase,
    Payment,
    Refund,
    Cancel,
}

impl TransactionType {
    /// §4.2: only PURCHASE/PAYMENT speculatively debit the cached wallet.
    #[must_use]
    pub fn debits_balance(self) -> bool {
        matches!(self, Self::Purchase | Self::Payment)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Purchase => "PURCHASE",
            Self::Payment => "PAYMENT",
            Self::Refund => "REFUND",
            Self::Cancel => "CANCEL",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StandType {
    Food,
    Drink,
    Merchandise,
    Service,
    Other,
}

/// §3: `SyncQueueItem.priority ∈ [0,3]`. `High` is used for monetary
/// operations (§4.2); `Critical` is reserved headroom above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Priority {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Low),
            1 => Some(Self::Normal),
            2 => Some(Self::High),
            3 => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueueOperation {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One line item of a typed product purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl ProductItem {
    #[must_use]
    pub fn subtotal(&self) -> Option<Money> {
        u64::from(self.quantity)
            .checked_mul(self.unit_price.0)
            .map(Money)
    }
}

/// §3 `PendingTransaction`: an offline-originated monetary event
/// awaiting confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub user_id: UserId,
    pub amount: Money,
    pub tx_type: TransactionType,
    pub stand_id: Option<StandId>,
    pub stand_name: Option<String>,
    pub description: Option<String>,
    pub product_items: Option<Vec<ProductItem>>,
    pub idempotency_key: String,
    pub offline_signature: String,
    pub device_id: DeviceId,
    pub created_at: DateTime<Utc>,
    pub synced: bool,
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// §3 `CachedWallet`: locally materialised view of a wallet the user
/// may spend from while offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedWallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub balance: Money,
    pub currency_name: String,
    pub exchange_rate: f64,
    pub qr_code: Option<String>,
    pub qr_expires_at: Option<DateTime<Utc>>,
    pub last_sync: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// §3 `CachedProduct`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedProduct {
    pub id: ProductId,
    pub stand_id: StandId,
    pub name: String,
    pub category: Option<String>,
    pub price: Money,
    pub available: bool,
    pub stock_quantity: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// §3 `CachedStand`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedStand {
    pub id: StandId,
    pub festival_id: String,
    pub name: String,
    pub stand_type: StandType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// §3 `CachedTransaction`: immutable history for offline browsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTransaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub amount: Money,
    pub tx_type: TransactionType,
    pub balance_after: Money,
    pub created_at: DateTime<Utc>,
}

/// §3 `SyncQueueItem`: one durable unit of work to dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub id: QueueItemId,
    pub operation: QueueOperation,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: serde_json::Value,
    pub priority: Priority,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub next_attempt: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub status: QueueStatus,
}

/// §3 `SchemaMigration`: forward-only ordered log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMigration {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// The entity-type tag attached to every `sync_queue` row for
/// `pending_transaction` work (§3 relationships).
pub const ENTITY_TYPE_PENDING_TRANSACTION: &str = "pending_transaction";

/// User intent passed into `createPendingTransaction` (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionIntent {
    pub wallet_id: WalletId,
    pub user_id: UserId,
    pub amount: Money,
    pub tx_type: TransactionType,
    pub stand_id: Option<StandId>,
    pub stand_name: Option<String>,
    pub description: Option<String>,
    pub product_items: Option<Vec<ProductItem>>,
}
