//! Chain identity and membership model.
//!
//! A chain is one [`User`] row plus the [`Device`] rows that reference it.
//! Public identifiers are UUIDs; the legacy scheme (a 64-character sync code
//! and signed 64-bit device ids) is kept alongside them because older clients
//! still authenticate with it.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exact length of a legacy sync code.
pub const SYNC_CODE_LENGTH: usize = 64;

const SYNC_CODE_PREFIX: &str = "feed";
const SYNC_CODE_RANDOM_BYTES: usize = 30;

/// Validation errors returned by chain identifier constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainValidationError {
    /// Sync code was not exactly [`SYNC_CODE_LENGTH`] characters.
    #[error("sync code must be exactly {expected} characters, got {actual}")]
    SyncCodeLength { expected: usize, actual: usize },
    /// Identifier could not be parsed as a UUID.
    #[error("{field} must be a valid UUID")]
    InvalidUuid { field: &'static str },
}

/// Internal surrogate key of a user row.
///
/// Surrogate keys differ between storage backends and never leave the
/// process; use [`ChainId`] for anything portable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserDbId(i64);

impl UserDbId {
    /// Wrap a raw surrogate key.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Access the raw surrogate key.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserDbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal surrogate key of a device row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceDbId(i64);

impl DeviceDbId {
    /// Wrap a raw surrogate key.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Access the raw surrogate key.
    pub const fn get(self) -> i64 {
        self.0
    }
}

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Parse the canonical textual form.
            pub fn parse(value: &str) -> Result<Self, ChainValidationError> {
                Uuid::parse_str(value)
                    .map(Self)
                    .map_err(|_| ChainValidationError::InvalidUuid { field: $field })
            }

            /// Access the underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }
    };
}

uuid_identifier!(
    /// Stable public identifier of a chain.
    ChainId,
    "chain id"
);

uuid_identifier!(
    /// Stable public identifier of a device.
    DeviceId,
    "device id"
);

/// Legacy opaque chain token, exactly [`SYNC_CODE_LENGTH`] characters.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SyncCode(String);

impl SyncCode {
    /// Validate a sync code supplied by a client or a migration caller.
    ///
    /// # Examples
    /// ```
    /// use chainsync::domain::SyncCode;
    ///
    /// assert!(SyncCode::parse("too-short").is_err());
    /// assert!(SyncCode::parse(&"a".repeat(64)).is_ok());
    /// ```
    pub fn parse(value: impl Into<String>) -> Result<Self, ChainValidationError> {
        let value = value.into();
        let actual = value.chars().count();
        if actual != SYNC_CODE_LENGTH {
            return Err(ChainValidationError::SyncCodeLength {
                expected: SYNC_CODE_LENGTH,
                actual,
            });
        }
        Ok(Self(value))
    }

    /// Generate a fresh sync code: `feed` followed by 60 hex characters.
    pub fn generate<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0_u8; SYNC_CODE_RANDOM_BYTES];
        rng.fill_bytes(&mut bytes);
        Self(format!("{SYNC_CODE_PREFIX}{}", hex::encode(bytes)))
    }

    /// Borrow the code as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

// Sync codes are bearer credentials; keep them out of debug logs.
impl fmt::Debug for SyncCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "SyncCode({prefix}…)")
    }
}

impl TryFrom<String> for SyncCode {
    type Error = ChainValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SyncCode> for String {
    fn from(value: SyncCode) -> Self {
        value.0
    }
}

/// Legacy numeric device identifier, unique within its owning chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyDeviceId(i64);

impl LegacyDeviceId {
    /// Wrap a raw legacy id.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Draw a random non-negative legacy id for a newly registered device.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(0..=i64::MAX))
    }

    /// Access the raw value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for LegacyDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Either key a caller may use to address an existing chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainKey {
    /// The UUID-based public identifier.
    Public(ChainId),
    /// The legacy sync code.
    SyncCode(SyncCode),
}

impl From<ChainId> for ChainKey {
    fn from(value: ChainId) -> Self {
        Self::Public(value)
    }
}

impl From<SyncCode> for ChainKey {
    fn from(value: SyncCode) -> Self {
        Self::SyncCode(value)
    }
}

/// A stored chain identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub db_id: UserDbId,
    pub public_id: ChainId,
    pub sync_code: SyncCode,
}

/// A user row that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub public_id: ChainId,
    pub sync_code: SyncCode,
}

impl NewUser {
    /// Build a user with a fresh public id for the given sync code.
    pub fn with_sync_code(sync_code: SyncCode) -> Self {
        Self {
            public_id: ChainId::random(),
            sync_code,
        }
    }
}

/// A stored chain member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub db_id: DeviceDbId,
    pub public_id: DeviceId,
    pub owner: UserDbId,
    pub name: String,
    pub legacy_id: LegacyDeviceId,
    pub last_seen: DateTime<Utc>,
}

/// A device row that has not been stored yet.
///
/// The owner is supplied separately at insert time because registration
/// only learns it once the user row exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDevice {
    pub public_id: DeviceId,
    pub name: String,
    pub legacy_id: LegacyDeviceId,
    pub last_seen: DateTime<Utc>,
}

impl NewDevice {
    /// Build a device with a fresh public id.
    pub fn new(name: impl Into<String>, legacy_id: LegacyDeviceId, seen_at: DateTime<Utc>) -> Self {
        Self {
            public_id: DeviceId::random(),
            name: name.into(),
            legacy_id,
            last_seen: seen_at,
        }
    }
}
