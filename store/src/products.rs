//! CRUD for `cached_products` (§3 `CachedProduct`) — owned by its stand,
//! cascades on delete.

use sqlx::{Row, Sqlite};

use core::types::{CachedProduct, Money, ProductId, StandId};
use errors::StoreError;

use crate::util::{parse_timestamp, parse_uuid};

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::StoreUnavailable { reason: e.to_string() }
}

pub async fn upsert<'e, E>(executor: E, product: &CachedProduct) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO cached_products
            (id, stand_id, name, category, price, available, stock_quantity, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
            stand_id = excluded.stand_id,
            name = excluded.name,
            category = excluded.category,
            price = excluded.price,
            available = excluded.available,
            stock_quantity = excluded.stock_quantity,
            updated_at = excluded.updated_at",
    )
    .bind(product.id.as_uuid().to_string())
    .bind(product.stand_id.as_uuid().to_string())
    .bind(&product.name)
    .bind(&product.category)
    .bind(product.price.0 as i64)
    .bind(product.available)
    .bind(product.stock_quantity.map(|q| q as i64))
    .bind(product.created_at.to_rfc3339())
    .bind(product.updated_at.to_rfc3339())
    .execute(executor)
    .await
    .map_err(unavailable)?;
    Ok(())
}

/// Bulk-upserts a full catalogue page in one transaction.
pub async fn batch_upsert(pool: &sqlx::SqlitePool, products: &[CachedProduct]) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(unavailable)?;
    for product in products {
        upsert(&mut *tx, product).await?;
    }
    tx.commit().await.map_err(unavailable)?;
    Ok(())
}

pub async fn get_by_id(pool: &sqlx::SqlitePool, id: ProductId) -> Result<Option<CachedProduct>, StoreError> {
    let row = sqlx::query("SELECT * FROM cached_products WHERE id = ?")
        .bind(id.as_uuid().to_string())
        .fetch_optional(pool)
        .await
        .map_err(unavailable)?;
    row.map(from_row).transpose()
}

/// Filtered/paginated listing, indexed on `(stand_id, category, available)`.
pub async fn list_by_stand(
    pool: &sqlx::SqlitePool,
    stand_id: StandId,
    category: Option<&str>,
    available_only: bool,
) -> Result<Vec<CachedProduct>, StoreError> {
    let rows = match category {
        Some(category) if available_only => {
            sqlx::query("SELECT * FROM cached_products WHERE stand_id = ? AND category = ? AND available = 1")
                .bind(stand_id.as_uuid().to_string())
                .bind(category)
                .fetch_all(pool)
                .await
        }
        Some(category) => {
            sqlx::query("SELECT * FROM cached_products WHERE stand_id = ? AND category = ?")
                .bind(stand_id.as_uuid().to_string())
                .bind(category)
                .fetch_all(pool)
                .await
        }
        None if available_only => {
            sqlx::query("SELECT * FROM cached_products WHERE stand_id = ? AND available = 1")
                .bind(stand_id.as_uuid().to_string())
                .fetch_all(pool)
                .await
        }
        None => {
            sqlx::query("SELECT * FROM cached_products WHERE stand_id = ?")
                .bind(stand_id.as_uuid().to_string())
                .fetch_all(pool)
                .await
        }
    }
    .map_err(unavailable)?;

    rows.into_iter().map(from_row).collect()
}

fn from_row(row: sqlx::sqlite::SqliteRow) -> Result<CachedProduct, StoreError> {
    let corrupt = |reason: String| StoreError::StoreCorrupt { reason };

    let id: String = row.try_get("id").map_err(|e| corrupt(e.to_string()))?;
    let stand_id: String = row.try_get("stand_id").map_err(|e| corrupt(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| corrupt(e.to_string()))?;
    let category: Option<String> = row.try_get("category").map_err(|e| corrupt(e.to_string()))?;
    let price: i64 = row.try_get("price").map_err(|e| corrupt(e.to_string()))?;
    let available: bool = row.try_get("available").map_err(|e| corrupt(e.to_string()))?;
    let stock_quantity: Option<i64> = row.try_get("stock_quantity").map_err(|e| corrupt(e.to_string()))?;
    let created_at: String = row.try_get("created_at").map_err(|e| corrupt(e.to_string()))?;
    let updated_at: String = row.try_get("updated_at").map_err(|e| corrupt(e.to_string()))?;

    Ok(CachedProduct {
        id: ProductId(parse_uuid(&id)?),
        stand_id: StandId(parse_uuid(&stand_id)?),
        name,
        category,
        price: Money(price as u64),
        available,
        stock_quantity: stock_quantity.map(|q| q as u32),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
