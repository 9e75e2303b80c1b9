//! Cache-validation token over a chain's device membership.

use std::fmt;

use sha2::{Digest, Sha256};

use super::chain::{Device, DeviceId};

/// Stable hash over the set of device ids in a chain.
///
/// Only membership feeds the hash: names and `last_seen` are ignored, and
/// the ids are sorted first so storage order does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DevicesFingerprint(String);

impl DevicesFingerprint {
    /// Fingerprint a device list.
    pub fn of(devices: &[Device]) -> Self {
        let mut ids: Vec<DeviceId> = devices.iter().map(|device| device.public_id).collect();
        ids.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(u64::try_from(ids.len()).unwrap_or(u64::MAX).to_be_bytes());
        for id in &ids {
            hasher.update(id.as_uuid().as_bytes());
        }
        Self(format!("\"{}\"", hex::encode(hasher.finalize())))
    }

    /// Borrow the quoted token, suitable for an `ETag` header.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DevicesFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
