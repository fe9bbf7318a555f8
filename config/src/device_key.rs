use std::fmt;

use serde::Serialize;
use zeroize::Zeroizing;

/// The device's HMAC signing key (§6 `HMAC_DEVICE_KEY`), provisioned
/// out of band and held as process-wide read-only state (§5). Wrapped
/// in `Zeroizing` so the key material is wiped on drop; `Debug` never
/// prints the bytes.
#[derive(Clone, Serialize)]
pub struct DeviceKey(#[serde(skip)] Zeroizing<Vec<u8>>);

impl DeviceKey {
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceKey").field(&"<redacted>").finish()
    }
}
