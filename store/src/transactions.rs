//! CRUD for `cached_transactions` (§3 `CachedTransaction`) — immutable
//! history for offline browsing. Inserts are idempotent: a conflict on
//! `id` is a no-op, preserving the first-written balance snapshot
//! (§8's "applying the server's response is a no-op if already applied").

use sqlx::{Row, Sqlite};

use core::types::{CachedTransaction, Money, TransactionId, TransactionType, WalletId};
use errors::StoreError;

use crate::util::{parse_timestamp, parse_uuid};

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::StoreUnavailable { reason: e.to_string() }
}

pub async fn insert_or_ignore<'e, E>(executor: E, row: &CachedTransaction) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO cached_transactions (id, wallet_id, amount, type, balance_after, created_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(row.id.as_uuid().to_string())
    .bind(row.wallet_id.as_uuid().to_string())
    .bind(row.amount.0 as i64)
    .bind(row.tx_type.to_string())
    .bind(row.balance_after.0 as i64)
    .bind(row.created_at.to_rfc3339())
    .execute(executor)
    .await
    .map_err(unavailable)?;
    Ok(())
}

pub async fn list_by_wallet(
    pool: &sqlx::SqlitePool,
    wallet_id: WalletId,
    limit: i64,
    offset: i64,
) -> Result<Vec<CachedTransaction>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM cached_transactions
         WHERE wallet_id = ?
         ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(wallet_id.as_uuid().to_string())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(unavailable)?;

    rows.into_iter().map(from_row).collect()
}

fn from_row(row: sqlx::sqlite::SqliteRow) -> Result<CachedTransaction, StoreError> {
    let corrupt = |reason: String| StoreError::StoreCorrupt { reason };

    let id: String = row.try_get("id").map_err(|e| corrupt(e.to_string()))?;
    let wallet_id: String = row.try_get("wallet_id").map_err(|e| corrupt(e.to_string()))?;
    let amount: i64 = row.try_get("amount").map_err(|e| corrupt(e.to_string()))?;
    let tx_type: String = row.try_get("type").map_err(|e| corrupt(e.to_string()))?;
    let balance_after: i64 = row.try_get("balance_after").map_err(|e| corrupt(e.to_string()))?;
    let created_at: String = row.try_get("created_at").map_err(|e| corrupt(e.to_string()))?;

    Ok(CachedTransaction {
        id: TransactionId(parse_uuid(&id)?),
        wallet_id: WalletId(parse_uuid(&wallet_id)?),
        amount: Money(amount as u64),
        tx_type: parse_tx_type(&tx_type)?,
        balance_after: Money(balance_after as u64),
        created_at: parse_timestamp(&created_at)?,
    })
}

fn parse_tx_type(value: &str) -> Result<TransactionType, StoreError> {
    match value {
        "PURCHASE" => Ok(TransactionType::Purchase),
        "PAYMENT" => Ok(TransactionType::Payment),
        "REFUND" => Ok(TransactionType::Refund),
        "CANCEL" => Ok(TransactionType::Cancel),
        other => Err(StoreError::StoreCorrupt { reason: format!("unknown transaction type: {other}") }),
    }
}
