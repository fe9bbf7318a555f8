//! Fixture builders shared by every crate's integration tests.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tempfile::TempDir;

use config::DeviceKey;
use core::types::{
    CachedProduct, CachedStand, CachedWallet, DeviceId, Money, ProductId, StandId, StandType,
    UserId, WalletId,
};
use store::Store;

static UNIQUE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A monotonically increasing suffix for building distinct fixture
/// names/ids within a single test process, matching the reference
/// workspace's `fixtures::unique_id` counter.
#[must_use]
pub fn unique_suffix() -> u64 {
    UNIQUE_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// An in-process, migrated store with no file backing it — the
/// fastest fixture, and what most unit tests want.
///
/// # Panics
/// Panics if the store fails to open or migrate; a failure here means
/// the migration SQL itself is broken, which every caller wants to
/// fail loudly on rather than unwrap individually.
pub async fn in_memory_store() -> Store {
    Store::in_memory().await.expect("in-memory store should always open and migrate cleanly")
}

/// A tempfile-backed, migrated store, for tests that care about
/// surviving a simulated process restart (the store handle is dropped
/// and reopened against the same file) — `in_memory_store` can't model
/// that since SQLite's `:memory:` database dies with the connection.
///
/// The returned `TempDir` must be kept alive for as long as the store
/// (or any store reopened against its path) is in use; it deletes the
/// directory on drop.
///
/// # Panics
/// Panics if the temp directory or the store fails to create.
pub async fn temp_file_store() -> (TempDir, Store) {
    let dir = TempDir::new().expect("failed to create temp dir for store fixture");
    let db_path = dir.path().join("offline-core.sqlite3");
    let store = Store::open(db_path.to_str().expect("temp path is valid UTF-8"))
        .await
        .expect("temp-file store should open and migrate cleanly");
    (dir, store)
}

/// A fixed, non-empty device key, deterministic across test runs so
/// signature assertions can hardcode expected bytes when needed.
#[must_use]
pub fn fixed_device_key() -> DeviceKey {
    DeviceKey::from_bytes(vec![0x42; 32])
}

/// A fixed device id paired with [`fixed_device_key`], for tests that
/// need to assert on `(device_id, idempotency_key)` uniqueness.
#[must_use]
pub fn fixed_device_id() -> DeviceId {
    DeviceId(uuid::Uuid::from_u128(0xDE71CE))
}

/// A `CachedWallet` row with a fresh id/user, the given balance, and
/// `"tokens"` as its currency — the shape every engine/sync test needs
/// before it can exercise a purchase.
#[must_use]
pub fn sample_wallet(balance: Money) -> CachedWallet {
    let now = Utc::now();
    CachedWallet {
        id: WalletId::new(),
        user_id: UserId::new(),
        balance,
        currency_name: "tokens".to_string(),
        exchange_rate: 1.0,
        qr_code: None,
        qr_expires_at: None,
        last_sync: now,
        created_at: now,
        updated_at: now,
    }
}

/// A `CachedStand` row with a fresh id, for tests exercising the
/// catalogue cache.
#[must_use]
pub fn sample_stand(festival_id: &str, stand_type: StandType) -> CachedStand {
    let now = Utc::now();
    CachedStand {
        id: StandId::new(),
        festival_id: festival_id.to_string(),
        name: format!("Stand {}", unique_suffix()),
        stand_type,
        created_at: now,
        updated_at: now,
    }
}

/// A `CachedProduct` row owned by `stand_id`, for tests exercising
/// typed product purchases.
#[must_use]
pub fn sample_product(stand_id: StandId, price: Money) -> CachedProduct {
    let now = Utc::now();
    CachedProduct {
        id: ProductId::new(),
        stand_id,
        name: format!("Product {}", unique_suffix()),
        category: None,
        price,
        available: true,
        stock_quantity: None,
        created_at: now,
        updated_at: now,
    }
}

/// Inserts `wallet` into `store` and returns it unchanged, so callers
/// can chain fixture construction and persistence in one expression.
///
/// # Panics
/// Panics if the insert fails — a fixture helper failing to seed its
/// own store is a test-infrastructure bug, not a case to propagate.
pub async fn seed_wallet(store: &Store, wallet: CachedWallet) -> CachedWallet {
    store::wallets::upsert(store.pool(), &wallet).await.expect("seeding a fixture wallet should never fail");
    wallet
}
