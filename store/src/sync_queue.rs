//! CRUD for `sync_queue` (§3 `SyncQueueItem`), the durable work log the
//! dispatcher in `sync` drives. The store never persists a `processing`
//! status: per §4.5 it's an in-memory-only marker the dispatcher keeps,
//! so a crash mid-dispatch simply leaves the row `pending` for the next
//! process to pick up again.

use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite};

use core::types::{Priority, QueueItemId, QueueOperation, QueueStatus, SyncQueueItem};
use errors::StoreError;

use crate::util::parse_uuid;

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::StoreUnavailable { reason: e.to_string() }
}

pub async fn insert<'e, E>(executor: E, item: &SyncQueueItem) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let payload = serde_json::to_string(&item.payload).map_err(|e| StoreError::Serialization { reason: e.to_string() })?;

    sqlx::query(
        "INSERT INTO sync_queue
            (id, operation, entity_type, entity_id, payload, priority, retry_count,
             max_retries, created_at, last_attempt, next_attempt, error, status)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(item.id.as_uuid().to_string())
    .bind(operation_str(item.operation))
    .bind(&item.entity_type)
    .bind(&item.entity_id)
    .bind(payload)
    .bind(item.priority.as_i32())
    .bind(item.retry_count as i64)
    .bind(item.max_retries as i64)
    .bind(item.created_at.to_rfc3339())
    .bind(item.last_attempt.map(|t| t.to_rfc3339()))
    .bind(item.next_attempt.map(|t| t.to_rfc3339()))
    .bind(&item.error)
    .bind(item.status.to_string())
    .execute(executor)
    .await
    .map_err(unavailable)?;

    metrics::counter!("sync_queue_enqueued_total").increment(1);
    Ok(())
}

/// Selects up to `batch_size` dispatchable items: `pending` and due,
/// priority descending then FIFO by creation — the exact ordering
/// §4.5 specifies for the dispatcher's selection query.
pub async fn select_dispatchable(pool: &sqlx::SqlitePool, batch_size: i64) -> Result<Vec<SyncQueueItem>, StoreError> {
    let now = Utc::now().to_rfc3339();
    let rows = sqlx::query(
        "SELECT * FROM sync_queue
         WHERE status = 'pending' AND (next_attempt IS NULL OR next_attempt <= ?)
         ORDER BY priority DESC, created_at ASC
         LIMIT ?",
    )
    .bind(now)
    .bind(batch_size)
    .fetch_all(pool)
    .await
    .map_err(unavailable)?;

    rows.into_iter().map(from_row).collect()
}

pub async fn get_by_id(pool: &sqlx::SqlitePool, id: QueueItemId) -> Result<Option<SyncQueueItem>, StoreError> {
    let row = sqlx::query("SELECT * FROM sync_queue WHERE id = ?")
        .bind(id.as_uuid().to_string())
        .fetch_optional(pool)
        .await
        .map_err(unavailable)?;
    row.map(from_row).transpose()
}

/// Marks an item `completed` on a successful handler ACK.
pub async fn mark_completed(pool: &sqlx::SqlitePool, id: QueueItemId) -> Result<(), StoreError> {
    sqlx::query("UPDATE sync_queue SET status = 'completed', last_attempt = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(id.as_uuid().to_string())
        .execute(pool)
        .await
        .map_err(unavailable)?;
    metrics::counter!("sync_queue_completed_total").increment(1);
    Ok(())
}

/// Bumps `retry_count`, records the error, and schedules `next_attempt`
/// for a transient failure (§4.3).
pub async fn mark_retry(
    pool: &sqlx::SqlitePool,
    id: QueueItemId,
    next_attempt: DateTime<Utc>,
    error: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE sync_queue
         SET retry_count = retry_count + 1, last_attempt = ?, next_attempt = ?, error = ?
         WHERE id = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(next_attempt.to_rfc3339())
    .bind(error)
    .bind(id.as_uuid().to_string())
    .execute(pool)
    .await
    .map_err(unavailable)?;
    metrics::counter!("sync_queue_retried_total").increment(1);
    Ok(())
}

/// Moves an item to `failed` — either a permanent classification or
/// `retry_count == max_retries` exhaustion (§4.3, §7).
pub async fn mark_failed(pool: &sqlx::SqlitePool, id: QueueItemId, error: &str) -> Result<(), StoreError> {
    sqlx::query("UPDATE sync_queue SET status = 'failed', last_attempt = ?, error = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(error)
        .bind(id.as_uuid().to_string())
        .execute(pool)
        .await
        .map_err(unavailable)?;
    metrics::counter!("sync_queue_failed_total").increment(1);
    Ok(())
}

/// Lists items in a given status, most recently created first — used
/// by operator tooling to inspect `failed`/`pending` items rather than
/// only their counts.
pub async fn list_by_status(
    pool: &sqlx::SqlitePool,
    status: QueueStatus,
    limit: i64,
) -> Result<Vec<SyncQueueItem>, StoreError> {
    let rows = sqlx::query("SELECT * FROM sync_queue WHERE status = ? ORDER BY created_at DESC LIMIT ?")
        .bind(status.to_string())
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(unavailable)?;

    rows.into_iter().map(from_row).collect()
}

/// Counts by status, keyed for `statsByStatus()`.
pub async fn count_by_status(pool: &sqlx::SqlitePool, status: QueueStatus) -> Result<i64, StoreError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE status = ?")
        .bind(status.to_string())
        .fetch_one(pool)
        .await
        .map_err(unavailable)
}

/// Deletes `completed` items older than `before`, per §8's retention
/// invariant (purging never touches any other row).
pub async fn purge_completed_before(pool: &sqlx::SqlitePool, before: DateTime<Utc>) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM sync_queue WHERE status = 'completed' AND created_at < ?")
        .bind(before.to_rfc3339())
        .execute(pool)
        .await
        .map_err(unavailable)?;
    Ok(result.rows_affected())
}

fn operation_str(operation: QueueOperation) -> &'static str {
    match operation {
        QueueOperation::Create => "CREATE",
        QueueOperation::Update => "UPDATE",
        QueueOperation::Delete => "DELETE",
    }
}

fn parse_operation(value: &str) -> Result<QueueOperation, StoreError> {
    match value {
        "CREATE" => Ok(QueueOperation::Create),
        "UPDATE" => Ok(QueueOperation::Update),
        "DELETE" => Ok(QueueOperation::Delete),
        other => Err(StoreError::StoreCorrupt { reason: format!("unknown queue operation: {other}") }),
    }
}

fn parse_status(value: &str) -> Result<QueueStatus, StoreError> {
    match value {
        "pending" => Ok(QueueStatus::Pending),
        "processing" => Ok(QueueStatus::Processing),
        "completed" => Ok(QueueStatus::Completed),
        "failed" => Ok(QueueStatus::Failed),
        other => Err(StoreError::StoreCorrupt { reason: format!("unknown queue status: {other}") }),
    }
}

fn from_row(row: sqlx::sqlite::SqliteRow) -> Result<SyncQueueItem, StoreError> {
    let corrupt = |reason: String| StoreError::StoreCorrupt { reason };

    let id: String = row.try_get("id").map_err(|e| corrupt(e.to_string()))?;
    let operation: String = row.try_get("operation").map_err(|e| corrupt(e.to_string()))?;
    let entity_type: String = row.try_get("entity_type").map_err(|e| corrupt(e.to_string()))?;
    let entity_id: String = row.try_get("entity_id").map_err(|e| corrupt(e.to_string()))?;
    let payload: String = row.try_get("payload").map_err(|e| corrupt(e.to_string()))?;
    let priority: i64 = row.try_get("priority").map_err(|e| corrupt(e.to_string()))?;
    let retry_count: i64 = row.try_get("retry_count").map_err(|e| corrupt(e.to_string()))?;
    let max_retries: i64 = row.try_get("max_retries").map_err(|e| corrupt(e.to_string()))?;
    let created_at: String = row.try_get("created_at").map_err(|e| corrupt(e.to_string()))?;
    let last_attempt: Option<String> = row.try_get("last_attempt").map_err(|e| corrupt(e.to_string()))?;
    let next_attempt: Option<String> = row.try_get("next_attempt").map_err(|e| corrupt(e.to_string()))?;
    let error: Option<String> = row.try_get("error").map_err(|e| corrupt(e.to_string()))?;
    let status: String = row.try_get("status").map_err(|e| corrupt(e.to_string()))?;

    Ok(SyncQueueItem {
        id: QueueItemId(parse_uuid(&id)?),
        operation: parse_operation(&operation)?,
        entity_type,
        entity_id,
        payload: serde_json::from_str(&payload).map_err(|e| corrupt(e.to_string()))?,
        priority: Priority::from_i32(priority as i32).ok_or_else(|| corrupt(format!("unknown priority: {priority}")))?,
        retry_count: retry_count as u32,
        max_retries: max_retries as u32,
        created_at: crate::util::parse_timestamp(&created_at)?,
        last_attempt: last_attempt.map(|t| crate::util::parse_timestamp(&t)).transpose()?,
        next_attempt: next_attempt.map(|t| crate::util::parse_timestamp(&t)).transpose()?,
        error,
        status: parse_status(&status)?,
    })
}
