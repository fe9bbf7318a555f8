//! Schema versioning (§4.1): `MAX(version)` in `schema_migrations` is the
//! current version; each migration runs in its own transaction and is
//! never re-applied. The inverse (`down_sql`) is carried for explicit
//! rollback tooling only — `run` never invokes it.

use chrono::Utc;
use sqlx::SqlitePool;

use errors::StoreError;

/// One forward/inverse statement pair, identified by an ascending version.
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
}

/// A row of the `schema_migrations` audit log.
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub description: String,
    pub applied_at: chrono::DateTime<Utc>,
}

/// The ordered, forward-only migration log for the local store.
pub fn all() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "initial schema",
        up_sql: include_str!("migrations/0001_initial.sql"),
        down_sql: include_str!("migrations/0001_initial.down.sql"),
    }]
}

/// Opens (creating if absent) the `schema_migrations` table and applies
/// every migration newer than the current version, each as its own
/// transaction. Stops at the first failing migration — later ones are
/// not attempted, matching §4.1's `MigrationFailed{version,reason}`
/// contract.
pub async fn run(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;

    let current_version: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
        .fetch_one(pool)
        .await
        .map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;

    for migration in all().into_iter().filter(|m| m.version > current_version) {
        apply(pool, &migration).await?;
    }

    Ok(())
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(|e| StoreError::MigrationFailed {
        version: migration.version,
        reason: e.to_string(),
    })?;

    sqlx::raw_sql(migration.up_sql)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::MigrationFailed {
            version: migration.version,
            reason: e.to_string(),
        })?;

    sqlx::query("INSERT INTO schema_migrations (version, description, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.description)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::MigrationFailed {
            version: migration.version,
            reason: e.to_string(),
        })?;

    tx.commit().await.map_err(|e| StoreError::MigrationFailed {
        version: migration.version,
        reason: e.to_string(),
    })?;

    tracing::info!(version = migration.version, "applied schema migration");
    Ok(())
}

/// `MAX(version)` — the store's current schema version.
pub async fn current_version(pool: &SqlitePool) -> Result<i64, StoreError> {
    sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
        .fetch_one(pool)
        .await
        .map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })
}

/// The full applied-migration history, ascending by version.
pub async fn history(pool: &SqlitePool) -> Result<Vec<MigrationRecord>, StoreError> {
    let rows: Vec<(i64, String, String)> = sqlx::query_as(
        "SELECT version, description, applied_at FROM schema_migrations ORDER BY version ASC",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| StoreError::StoreUnavailable { reason: e.to_string() })?;

    rows.into_iter()
        .map(|(version, description, applied_at)| {
            chrono::DateTime::parse_from_rfc3339(&applied_at)
                .map(|dt| MigrationRecord {
                    version,
                    description,
                    applied_at: dt.with_timezone(&Utc),
                })
                .map_err(|e| StoreError::StoreCorrupt { reason: e.to_string() })
        })
        .collect()
}
