//! # Offline Core Configuration
//!
//! Environment-driven configuration (§6) for the offline transaction
//! and sync core: the provisioned device HMAC key and the sync
//! queue's network/scheduling knobs.

mod device_key;
mod loader;

pub use device_key::DeviceKey;
pub use loader::load_from_env;

use serde::Serialize;
use validator::Validate;

/// Default `SYNC_BATCH_SIZE` (§6).
pub const DEFAULT_SYNC_BATCH_SIZE: usize = 20;
/// Default `SYNC_HEARTBEAT_MS` (§6).
pub const DEFAULT_SYNC_HEARTBEAT_MS: u64 = 15_000;
/// Default `SYNC_MAX_IN_FLIGHT` (§6).
pub const DEFAULT_SYNC_MAX_IN_FLIGHT: usize = 4;

/// Process-wide configuration, assembled once at startup and passed
/// down by reference. `device_key` is the only secret; everything else
/// is freely clonable/loggable.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct OfflineCoreConfig {
    #[serde(skip)]
    pub device_key: DeviceKey,

    pub sync_base_url: String,

    #[validate(range(min = 1, max = 500))]
    pub sync_batch_size: usize,

    #[validate(range(min = 100))]
    pub sync_heartbeat_ms: u64,

    #[validate(range(min = 1, max = 64))]
    pub sync_max_in_flight: usize,
}

impl OfflineCoreConfig {
    /// Builds a config for tests: a deterministic device key and
    /// in-process defaults, bypassing environment lookup.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            device_key: DeviceKey::from_bytes(vec![0x42; 32]),
            sync_base_url: "http://localhost:0".to_string(),
            sync_batch_size: DEFAULT_SYNC_BATCH_SIZE,
            sync_heartbeat_ms: DEFAULT_SYNC_HEARTBEAT_MS,
            sync_max_in_flight: DEFAULT_SYNC_MAX_IN_FLIGHT,
        }
    }
}
