//! CRUD for `pending_transactions` (§3 `PendingTransaction`).

use chrono::Utc;
use sqlx::{Row, Sqlite};

use core::types::{DeviceId, Money, PendingTransaction, ProductItem, StandId, TransactionId, TransactionType, UserId, WalletId};
use errors::StoreError;

/// Inserts a new pending transaction row. Callers within the pending
/// engine's atomic procedure (§4.2) pass a `&mut Transaction`; standalone
/// callers (e.g. replaying from backup) may pass the pool directly.
pub async fn insert<'e, E>(executor: E, row: &PendingTransaction) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let product_items = match &row.product_items {
        Some(items) => Some(serde_json::to_string(items).map_err(|e| StoreError::Serialization { reason: e.to_string() })?),
        None => None,
    };

    sqlx::query(
        "INSERT INTO pending_transactions
            (id, wallet_id, user_id, amount, type, stand_id, stand_name, description,
             product_items, idempotency_key, offline_signature, device_id, created_at,
             synced, retry_count, last_retry_at, error)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(row.id.as_uuid().to_string())
    .bind(row.wallet_id.as_uuid().to_string())
    .bind(row.user_id.as_uuid().to_string())
    .bind(row.amount.0 as i64)
    .bind(row.tx_type.to_string())
    .bind(row.stand_id.map(|id| id.as_uuid().to_string()))
    .bind(&row.stand_name)
    .bind(&row.description)
    .bind(product_items)
    .bind(&row.idempotency_key)
    .bind(&row.offline_signature)
    .bind(row.device_id.as_uuid().to_string())
    .bind(row.created_at.to_rfc3339())
    .bind(row.synced)
    .bind(row.retry_count as i64)
    .bind(row.last_retry_at.map(|t| t.to_rfc3339()))
    .bind(&row.error)
    .execute(executor)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::StoreCorrupt {
            reason: format!("idempotency key collision for device {}: {e}", row.device_id),
        },
        _ => StoreError::StoreUnavailable { reason: e.to_string() },
    })?;

    Ok(())
}

pub async fn get_by_id(pool: &sqlx::SqlitePool, id: TransactionId) -> Result<Option<PendingTransaction>, StoreError> {
    let row = sqlx::query("SELECT * FROM pending_transactions WHERE id = ?")
        .bind(id.as_uuid().to_string())
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;

    row.map(from_row).transpose()
}

/// Looks a row up by its `(device_id, idempotency_key)` unique key —
/// the at-most-once check the pending engine and replay path both need.
pub async fn get_by_idempotency_key(
    pool: &sqlx::SqlitePool,
    device_id: DeviceId,
    idempotency_key: &str,
) -> Result<Option<PendingTransaction>, StoreError> {
    let row = sqlx::query("SELECT * FROM pending_transactions WHERE device_id = ? AND idempotency_key = ?")
        .bind(device_id.as_uuid().to_string())
        .bind(idempotency_key)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;

    row.map(from_row).transpose()
}

/// Lists pending transactions for a wallet, optionally filtered by
/// sync status, ordered oldest-first, page by `limit`/`offset`
/// (indexed on `(wallet_id, synced, created_at)` per §4.1).
pub async fn list_by_wallet(
    pool: &sqlx::SqlitePool,
    wallet_id: WalletId,
    synced: Option<bool>,
    limit: i64,
    offset: i64,
) -> Result<Vec<PendingTransaction>, StoreError> {
    let rows = match synced {
        Some(synced) => {
            sqlx::query(
                "SELECT * FROM pending_transactions
                 WHERE wallet_id = ? AND synced = ?
                 ORDER BY created_at ASC LIMIT ? OFFSET ?",
            )
            .bind(wallet_id.as_uuid().to_string())
            .bind(synced)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(
                "SELECT * FROM pending_transactions
                 WHERE wallet_id = ?
                 ORDER BY created_at ASC LIMIT ? OFFSET ?",
            )
            .bind(wallet_id.as_uuid().to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
    }
    .map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;

    rows.into_iter().map(from_row).collect()
}

/// Marks a pending transaction synced, with an optional failure note
/// (§4.4's `PermanentMonetaryRejection` path sets both at once).
pub async fn mark_synced(pool: &sqlx::SqlitePool, id: TransactionId, error: Option<&str>) -> Result<(), StoreError> {
    sqlx::query("UPDATE pending_transactions SET synced = 1, error = ? WHERE id = ?")
        .bind(error)
        .bind(id.as_uuid().to_string())
        .execute(pool)
        .await
        .map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;
    Ok(())
}

/// Deletes `synced` pending transactions created before `before` — the
/// same operator-facing retention mechanism `sync_queue::purge_completed_before`
/// exposes, so a synced, queue-completed transaction doesn't linger
/// forever once it's also been cross-checked against server history.
pub async fn purge_synced_before(pool: &sqlx::SqlitePool, before: chrono::DateTime<chrono::Utc>) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM pending_transactions WHERE synced = 1 AND created_at < ?")
        .bind(before.to_rfc3339())
        .execute(pool)
        .await
        .map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;
    Ok(result.rows_affected())
}

/// Bumps `retry_count` and `last_retry_at` on a transient dispatch
/// failure (§4.3).
pub async fn record_retry(pool: &sqlx::SqlitePool, id: TransactionId, error: &str) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE pending_transactions
         SET retry_count = retry_count + 1, last_retry_at = ?, error = ?
         WHERE id = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(error)
    .bind(id.as_uuid().to_string())
    .execute(pool)
    .await
    .map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;
    Ok(())
}

fn from_row(row: sqlx::sqlite::SqliteRow) -> Result<PendingTransaction, StoreError> {
    let corrupt = |reason: String| StoreError::StoreCorrupt { reason };

    let id: String = row.try_get("id").map_err(|e| corrupt(e.to_string()))?;
    let wallet_id: String = row.try_get("wallet_id").map_err(|e| corrupt(e.to_string()))?;
    let user_id: String = row.try_get("user_id").map_err(|e| corrupt(e.to_string()))?;
    let amount: i64 = row.try_get("amount").map_err(|e| corrupt(e.to_string()))?;
    let tx_type: String = row.try_get("type").map_err(|e| corrupt(e.to_string()))?;
    let stand_id: Option<String> = row.try_get("stand_id").map_err(|e| corrupt(e.to_string()))?;
    let stand_name: Option<String> = row.try_get("stand_name").map_err(|e| corrupt(e.to_string()))?;
    let description: Option<String> = row.try_get("description").map_err(|e| corrupt(e.to_string()))?;
    let product_items: Option<String> = row.try_get("product_items").map_err(|e| corrupt(e.to_string()))?;
    let idempotency_key: String = row.try_get("idempotency_key").map_err(|e| corrupt(e.to_string()))?;
    let offline_signature: String = row.try_get("offline_signature").map_err(|e| corrupt(e.to_string()))?;
    let device_id: String = row.try_get("device_id").map_err(|e| corrupt(e.to_string()))?;
    let created_at: String = row.try_get("created_at").map_err(|e| corrupt(e.to_string()))?;
    let synced: bool = row.try_get("synced").map_err(|e| corrupt(e.to_string()))?;
    let retry_count: i64 = row.try_get("retry_count").map_err(|e| corrupt(e.to_string()))?;
    let last_retry_at: Option<String> = row.try_get("last_retry_at").map_err(|e| corrupt(e.to_string()))?;
    let error: Option<String> = row.try_get("error").map_err(|e| corrupt(e.to_string()))?;

    use crate::util::{parse_timestamp, parse_uuid};

    Ok(PendingTransaction {
        id: TransactionId(parse_uuid(&id)?),
        wallet_id: WalletId(parse_uuid(&wallet_id)?),
        user_id: UserId(parse_uuid(&user_id)?),
        amount: Money(amount as u64),
        tx_type: parse_tx_type(&tx_type)?,
        stand_id: stand_id.map(|s| parse_uuid(&s)).transpose()?.map(StandId),
        stand_name,
        description,
        product_items: product_items
            .map(|s| serde_json::from_str::<Vec<ProductItem>>(&s))
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?,
        idempotency_key,
        offline_signature,
        device_id: DeviceId(parse_uuid(&device_id)?),
        created_at: parse_timestamp(&created_at)?,
        synced,
        retry_count: retry_count as u32,
        last_retry_at: last_retry_at.map(|t| parse_timestamp(&t)).transpose()?,
        error,
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
