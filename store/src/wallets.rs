//! CRUD for `cached_wallets` (§3 `CachedWallet`).
//!
//! The `balance` column carries a `CHECK (balance >= 0)` constraint as a
//! last line of defence; callers are expected to have already validated
//! the debit via `Money::checked_sub` (Testable Property 6).

use chrono::Utc;
use sqlx::{Row, Sqlite};

use core::types::{CachedWallet, Money, UserId, WalletId};
use errors::StoreError;

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::StoreUnavailable { reason: e.to_string() }
}

/// Last-write-wins upsert on `id`, matching §4.1's deterministic
/// conflict clause for cache rows.
pub async fn upsert<'e, E>(executor: E, wallet: &CachedWallet) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO cached_wallets
            (id, user_id, balance, currency_name, exchange_rate, qr_code, qr_expires_at,
             last_sync, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
            user_id = excluded.user_id,
            balance = excluded.balance,
            currency_name = excluded.currency_name,
            exchange_rate = excluded.exchange_rate,
            qr_code = excluded.qr_code,
            qr_expires_at = excluded.qr_expires_at,
            last_sync = excluded.last_sync,
            updated_at = excluded.updated_at",
    )
    .bind(wallet.id.as_uuid().to_string())
    .bind(wallet.user_id.as_uuid().to_string())
    .bind(wallet.balance.0 as i64)
    .bind(&wallet.currency_name)
    .bind(wallet.exchange_rate)
    .bind(&wallet.qr_code)
    .bind(wallet.qr_expires_at.map(|t| t.to_rfc3339()))
    .bind(wallet.last_sync.to_rfc3339())
    .bind(wallet.created_at.to_rfc3339())
    .bind(wallet.updated_at.to_rfc3339())
    .execute(executor)
    .await
    .map_err(unavailable)?;

    Ok(())
}

pub async fn get_by_id(pool: &sqlx::SqlitePool, id: WalletId) -> Result<Option<CachedWallet>, StoreError> {
    let row = sqlx::query("SELECT * FROM cached_wallets WHERE id = ?")
        .bind(id.as_uuid().to_string())
        .fetch_optional(pool)
        .await
        .map_err(unavailable)?;

    row.map(from_row).transpose()
}

pub async fn get_by_user(pool: &sqlx::SqlitePool, user_id: UserId) -> Result<Option<CachedWallet>, StoreError> {
    let row = sqlx::query("SELECT * FROM cached_wallets WHERE user_id = ?")
        .bind(user_id.as_uuid().to_string())
        .fetch_optional(pool)
        .await
        .map_err(unavailable)?;

    row.map(from_row).transpose()
}

/// Speculative debit/credit (§4.2d / §4.4's reversal path): the new
/// balance is computed by the caller via `Money::checked_sub` /
/// `checked_add` so this function never needs to reason about
/// underflow — it is only ever asked to persist an already-valid value.
pub async fn set_balance<'e, E>(executor: E, id: WalletId, balance: Money) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE cached_wallets SET balance = ?, updated_at = ? WHERE id = ?")
        .bind(balance.0 as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(id.as_uuid().to_string())
        .execute(executor)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_check_violation() => {
                StoreError::StoreCorrupt { reason: format!("balance underflow rejected by store for wallet {id}") }
            }
            _ => unavailable(e),
        })?;
    Ok(())
}

fn from_row(row: sqlx::sqlite::SqliteRow) -> Result<CachedWallet, StoreError> {
    let corrupt = |reason: String| StoreError::StoreCorrupt { reason };

    let id: String = row.try_get("id").map_err(|e| corrupt(e.to_string()))?;
    let user_id: String = row.try_get("user_id").map_err(|e| corrupt(e.to_string()))?;
    let balance: i64 = row.try_get("balance").map_err(|e| corrupt(e.to_string()))?;
    let currency_name: String = row.try_get("currency_name").map_err(|e| corrupt(e.to_string()))?;
    let exchange_rate: f64 = row.try_get("exchange_rate").map_err(|e| corrupt(e.to_string()))?;
    let qr_code: Option<String> = row.try_get("qr_code").map_err(|e| corrupt(e.to_string()))?;
    let qr_expires_at: Option<String> = row.try_get("qr_expires_at").map_err(|e| corrupt(e.to_string()))?;
    let last_sync: String = row.try_get("last_sync").map_err(|e| corrupt(e.to_string()))?;
    let created_at: String = row.try_get("created_at").map_err(|e| corrupt(e.to_string()))?;
    let updated_at: String = row.try_get("updated_at").map_err(|e| corrupt(e.to_string()))?;

    Ok(CachedWallet {
        id: WalletId(crate::util::parse_uuid(&id)?),
        user_id: UserId(crate::util::parse_uuid(&user_id)?),
        balance: Money(balance as u64),
        currency_name,
        exchange_rate,
        qr_code,
        qr_expires_at: qr_expires_at.map(|t| crate::util::parse_timestamp(&t)).transpose()?,
        last_sync: crate::util::parse_timestamp(&last_sync)?,
        created_at: crate::util::parse_timestamp(&created_at)?,
        updated_at: crate::util::parse_timestamp(&updated_at)?,
    })
}
