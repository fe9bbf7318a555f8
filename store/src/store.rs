//! The local durable store (§4.1): the only component permitted to
//! touch the on-device SQLite database. Every other crate reaches
//! storage through a `Store` handle.

use std::future::Future;
use std::pin::Pin;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

use errors::StoreError;

use crate::migrations;

/// A boxed, `Send` future — the shape a `transaction` closure must return
/// so the borrow on the in-flight `Transaction` can cross an `.await`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Counts by status, for operator-facing observability (§4.1 `stats()`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub sync_queue_pending: i64,
    pub sync_queue_completed: i64,
    pub sync_queue_failed: i64,
    pub pending_transactions_unsynced: i64,
    pub pending_transactions_synced: i64,
}

/// A handle to the on-device SQLite database backing the offline core.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if absent) the database file at `path`, enables
    /// foreign keys, and runs any pending migrations. Fails with
    /// `StoreUnavailable` if the file cannot be opened.
    ///
    /// The pool is pinned to a single connection: §5 models the store as
    /// short, non-overlapping transactions driven by one dispatcher, so
    /// there is no benefit to a connection pool and every benefit to
    /// avoiding `SQLITE_BUSY` from concurrent writers.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true).foreign_keys(true);
        Self::connect(options).await
    }

    /// An in-process, migrated store backed by SQLite's in-memory mode —
    /// used by tests and by `testing::fixtures`.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().in_memory(true).foreign_keys(true);
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;

        migrations::run(&pool).await?;
        Ok(Self { pool })
    }

    /// Exposes the underlying pool for single-statement CRUD that
    /// doesn't need the atomic `transaction` helper.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs `f` as a single atomic unit against a fresh transaction:
    /// commits on `Ok`, rolls back on `Err`. This is the only path by
    /// which the pending-transaction engine may touch more than one
    /// table (§4.2's debit + insert + enqueue is one call).
    pub async fn transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: for<'c> FnOnce(&'c mut Transaction<'static, Sqlite>) -> BoxFuture<'c, Result<T, StoreError>>,
        T: Send,
    {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::StoreBusy { reason: e.to_string() })?;

        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await.map_err(|e| StoreError::StoreBusy { reason: e.to_string() })?;
                Ok(value)
            }
            Err(err) => {
                let _ = tx.rollback().await;
                Err(err)
            }
        }
    }

    /// Counts by status across the sync queue and pending transactions.
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let unavailable = |e: sqlx::Error| StoreError::StoreUnavailable { reason: e.to_string() };

        let sync_queue_pending: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;
        let sync_queue_completed: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE status = 'completed'")
                .fetch_one(&self.pool)
                .await
                .map_err(unavailable)?;
        let sync_queue_failed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE status = 'failed'")
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;
        let pending_transactions_unsynced: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_transactions WHERE synced = 0")
                .fetch_one(&self.pool)
                .await
                .map_err(unavailable)?;
        let pending_transactions_synced: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_transactions WHERE synced = 1")
                .fetch_one(&self.pool)
                .await
                .map_err(unavailable)?;

        let stats = StoreStats {
            sync_queue_pending,
            sync_queue_completed,
            sync_queue_failed,
            pending_transactions_unsynced,
            pending_transactions_synced,
        };
        metrics::gauge!("store_sync_queue_pending").set(stats.sync_queue_pending as f64);
        metrics::gauge!("store_sync_queue_failed").set(stats.sync_queue_failed as f64);
        Ok(stats)
    }
}
