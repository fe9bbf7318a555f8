//! Environment variable loader (§6 Environment).
//!
//! - `HMAC_DEVICE_KEY` — provisioned out of band; mandatory.
//! - `SYNC_BASE_URL` — server endpoint.
//! - `SYNC_BATCH_SIZE` (default 20), `SYNC_HEARTBEAT_MS` (15000),
//!   `SYNC_MAX_IN_FLIGHT` (4).

use std::env;

use errors::ConfigError;
use validator::Validate;

use crate::device_key::DeviceKey;
use crate::{DEFAULT_SYNC_BATCH_SIZE, DEFAULT_SYNC_HEARTBEAT_MS, DEFAULT_SYNC_MAX_IN_FLIGHT};
use crate::OfflineCoreConfig;

/// Load configuration from environment variables following 12-factor
/// app principles. `HMAC_DEVICE_KEY` and `SYNC_BASE_URL` are required;
/// the remaining sync knobs fall back to the defaults named in §6.
pub fn load_from_env() -> Result<OfflineCoreConfig, ConfigError> {
    let device_key_hex = env::var("HMAC_DEVICE_KEY").map_err(|_| ConfigError::MissingEnv {
        name: "HMAC_DEVICE_KEY".to_string(),
    })?;
    let device_key_bytes = hex::decode(device_key_hex.trim()).map_err(|e| ConfigError::InvalidValue {
        name: "HMAC_DEVICE_KEY".to_string(),
        reason: format!("expected hex-encoded key: {e}"),
    })?;
    if device_key_bytes.is_empty() {
        return Err(ConfigError::InvalidValue {
            name: "HMAC_DEVICE_KEY".to_string(),
            reason: "key must not be empty".to_string(),
        });
    }

    let sync_base_url = env::var("SYNC_BASE_URL").map_err(|_| ConfigError::MissingEnv {
        name: "SYNC_BASE_URL".to_string(),
    })?;

    let sync_batch_size = parse_env_or("SYNC_BATCH_SIZE", DEFAULT_SYNC_BATCH_SIZE)?;
    let sync_heartbeat_ms = parse_env_or("SYNC_HEARTBEAT_MS", DEFAULT_SYNC_HEARTBEAT_MS)?;
    let sync_max_in_flight = parse_env_or("SYNC_MAX_IN_FLIGHT", DEFAULT_SYNC_MAX_IN_FLIGHT)?;

    let config = OfflineCoreConfig {
        device_key: DeviceKey::from_bytes(device_key_bytes),
        sync_base_url,
        sync_batch_size,
        sync_heartbeat_ms,
        sync_max_in_flight,
    };

    config.validate().map_err(|e| ConfigError::InvalidValue {
        name: "sync".to_string(),
        reason: e.to_string(),
    })?;

    Ok(config)
}

fn parse_env_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const VARS: &[&str] = &[
        "HMAC_DEVICE_KEY",
        "SYNC_BASE_URL",
        "SYNC_BATCH_SIZE",
        "SYNC_HEARTBEAT_MS",
        "SYNC_MAX_IN_FLIGHT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn missing_device_key_is_rejected() {
        clear_env();
        env::set_var("SYNC_BASE_URL", "https://sync.example.test");
        let err = load_from_env().expect_err("HMAC_DEVICE_KEY is required");
        assert!(matches!(err, ConfigError::MissingEnv { name } if name == "HMAC_DEVICE_KEY"));
        clear_env();
    }

    #[test]
    #[serial]
    fn non_hex_device_key_is_rejected() {
        clear_env();
        env::set_var("HMAC_DEVICE_KEY", "not-hex");
        env::set_var("SYNC_BASE_URL", "https://sync.example.test");
        let err = load_from_env().expect_err("key must be hex-encoded");
        assert!(matches!(err, ConfigError::InvalidValue { name, .. } if name == "HMAC_DEVICE_KEY"));
        clear_env();
    }

    #[test]
    #[serial]
    fn missing_sync_base_url_is_rejected() {
        clear_env();
        env::set_var("HMAC_DEVICE_KEY", "2a2a2a2a");
        let err = load_from_env().expect_err("SYNC_BASE_URL is required");
        assert!(matches!(err, ConfigError::MissingEnv { name } if name == "SYNC_BASE_URL"));
        clear_env();
    }

    #[test]
    #[serial]
    fn defaults_apply_when_optional_vars_are_unset() {
        clear_env();
        env::set_var("HMAC_DEVICE_KEY", "2a2a2a2a2a2a2a2a");
        env::set_var("SYNC_BASE_URL", "https://sync.example.test");
        let config = load_from_env().expect("minimal env should load");
        assert_eq!(config.sync_batch_size, DEFAULT_SYNC_BATCH_SIZE);
        assert_eq!(config.sync_heartbeat_ms, DEFAULT_SYNC_HEARTBEAT_MS);
        assert_eq!(config.sync_max_in_flight, DEFAULT_SYNC_MAX_IN_FLIGHT);
        clear_env();
    }

    #[test]
    #[serial]
    fn out_of_range_batch_size_fails_validation() {
        clear_env();
        env::set_var("HMAC_DEVICE_KEY", "2a2a2a2a2a2a2a2a");
        env::set_var("SYNC_BASE_URL", "https://sync.example.test");
        env::set_var("SYNC_BATCH_SIZE", "0");
        let err = load_from_env().expect_err("batch size of 0 is out of range");
        assert!(matches!(err, ConfigError::InvalidValue { name, .. } if name == "sync"));
        clear_env();
    }

    #[test]
    #[serial]
    fn malformed_numeric_override_is_rejected() {
        clear_env();
        env::set_var("HMAC_DEVICE_KEY", "2a2a2a2a2a2a2a2a");
        env::set_var("SYNC_BASE_URL", "https://sync.example.test");
        env::set_var("SYNC_HEARTBEAT_MS", "not-a-number");
        let err = load_from_env().expect_err("non-numeric override should fail to parse");
        assert!(matches!(err, ConfigError::InvalidValue { name, .. } if name == "SYNC_HEARTBEAT_MS"));
        clear_env();
    }
}
