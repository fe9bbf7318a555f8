//! Row-decoding helpers shared across the per-table modules.

use chrono::Utc;

use errors::StoreError;

pub fn parse_uuid(value: &str) -> Result<uuid::Uuid, StoreError> {
    value.parse().map_err(|e: uuid::Error| StoreError::StoreCorrupt { reason: e.to_string() })
}

pub fn parse_timestamp(value: &str) -> Result<chrono::DateTime<Utc>, StoreError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::StoreCorrupt { reason: e.to_string() })
}
