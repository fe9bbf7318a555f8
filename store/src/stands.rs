//! CRUD for `cached_stands` (§3 `CachedStand`) — read-mostly catalogue,
//! bulk-upserted from the server and never mutated by offline operations.

use sqlx::{Row, Sqlite};

use core::types::{CachedStand, StandId, StandType};
use errors::StoreError;

use crate::util::{parse_timestamp, parse_uuid};

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::StoreUnavailable { reason: e.to_string() }
}

pub async fn upsert<'e, E>(executor: E, stand: &CachedStand) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO cached_stands (id, festival_id, name, type, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
            festival_id = excluded.festival_id,
            name = excluded.name,
            type = excluded.type,
            updated_at = excluded.updated_at",
    )
    .bind(stand.id.as_uuid().to_string())
    .bind(&stand.festival_id)
    .bind(stand_type_str(stand.stand_type))
    .bind(stand_type_str(stand.stand_type))
    .bind(stand.created_at.to_rfc3339())
    .bind(stand.updated_at.to_rfc3339())
    .execute(executor)
    .await
    .map_err(unavailable)?;
    Ok(())
}

/// Bulk-upserts a full catalogue refresh in one call; each row still
/// goes through the same deterministic conflict clause as `upsert`.
pub async fn batch_upsert(pool: &sqlx::SqlitePool, stands: &[CachedStand]) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(unavailable)?;
    for stand in stands {
        upsert(&mut *tx, stand).await?;
    }
    tx.commit().await.map_err(unavailable)?;
    Ok(())
}

pub async fn get_by_id(pool: &sqlx::SqlitePool, id: StandId) -> Result<Option<CachedStand>, StoreError> {
    let row = sqlx::query("SELECT * FROM cached_stands WHERE id = ?")
        .bind(id.as_uuid().to_string())
        .fetch_optional(pool)
        .await
        .map_err(unavailable)?;
    row.map(from_row).transpose()
}

pub async fn list_by_festival(
    pool: &sqlx::SqlitePool,
    festival_id: &str,
    stand_type: Option<StandType>,
) -> Result<Vec<CachedStand>, StoreError> {
    let rows = match stand_type {
        Some(t) => {
            sqlx::query("SELECT * FROM cached_stands WHERE festival_id = ? AND type = ?")
                .bind(festival_id)
                .bind(stand_type_str(t))
                .fetch_all(pool)
                .await
        }
        None => {
            sqlx::query("SELECT * FROM cached_stands WHERE festival_id = ?")
                .bind(festival_id)
                .fetch_all(pool)
                .await
        }
    }
    .map_err(unavailable)?;

    rows.into_iter().map(from_row).collect()
}

fn stand_type_str(stand_type: StandType) -> &'static str {
    match stand_type {
        StandType::Food => "FOOD",
        StandType::Drink => "DRINK",
        StandType::Merchandise => "MERCHANDISE",
        StandType::Service => "SERVICE",
        StandType::Other => "OTHER",
    }
}

fn parse_stand_type(value: &str) -> Result<StandType, StoreError> {
    match value {
        "FOOD" => Ok(StandType::Food),
        "DRINK" => Ok(StandType::Drink),
        "MERCHANDISE" => Ok(StandType::Merchandise),
        "SERVICE" => Ok(StandType::Service),
        "OTHER" => Ok(StandType::Other),
        other => Err(StoreError::StoreCorrupt { reason: format!("unknown stand type: {other}") }),
    }
}

fn from_row(row: sqlx::sqlite::SqliteRow) -> Result<CachedStand, StoreError> {
    let corrupt = |reason: String| StoreError::StoreCorrupt { reason };

    let id: String = row.try_get("id").map_err(|e| corrupt(e.to_string()))?;
    let festival_id: String = row.try_get("festival_id").map_err(|e| corrupt(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| corrupt(e.to_string()))?;
    let stand_type: String = row.try_get("type").map_err(|e| corrupt(e.to_string()))?;
    let created_at: String = row.try_get("created_at").map_err(|e| corrupt(e.to_string()))?;
    let updated_at: String = row.try_get("updated_at").map_err(|e| corrupt(e.to_string()))?;

    Ok(CachedStand {
        id: StandId(parse_uuid(&id)?),
        festival_id,
        name,
        stand_type: parse_stand_type(&stand_type)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
