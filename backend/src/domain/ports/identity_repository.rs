//! Port for chain identity and membership persistence.
//!
//! The [`IdentityRepository`] trait owns user and device rows. Every insert
//! reports unique-index collisions as
//! [`StoreError::DuplicateKey`](super::StoreError::DuplicateKey) so the
//! services can tell "already exists" apart from a failing backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    ChainId, Device, DeviceDbId, LegacyDeviceId, NewDevice, NewUser, SyncCode, User, UserDbId,
};

use super::StoreError;

/// Port for user and device storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Store a new chain and its first device atomically.
    ///
    /// Either both rows exist afterwards or neither does.
    async fn register_chain(
        &self,
        user: &NewUser,
        device: &NewDevice,
    ) -> Result<(User, Device), StoreError>;

    /// Insert a user row on its own.
    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError>;

    /// Insert a device under an existing user.
    async fn insert_device(
        &self,
        owner: UserDbId,
        device: &NewDevice,
    ) -> Result<Device, StoreError>;

    /// Look up a user by public id.
    async fn find_user_by_public_id(&self, id: &ChainId) -> Result<Option<User>, StoreError>;

    /// Look up a user by legacy sync code.
    async fn find_user_by_sync_code(&self, code: &SyncCode) -> Result<Option<User>, StoreError>;

    /// Look up one device of a chain by its legacy id.
    async fn find_device(
        &self,
        owner: UserDbId,
        legacy_id: LegacyDeviceId,
    ) -> Result<Option<Device>, StoreError>;

    /// List every device of a chain, ordered by insertion.
    async fn list_devices(&self, owner: UserDbId) -> Result<Vec<Device>, StoreError>;

    /// Delete at most one device, returning the number of rows removed.
    async fn delete_device(
        &self,
        owner: UserDbId,
        legacy_id: LegacyDeviceId,
    ) -> Result<u64, StoreError>;

    /// Advance `last_seen`, never moving it backwards.
    ///
    /// Returns the number of rows touched; zero when the device is gone or
    /// already carries a later timestamp.
    async fn touch_last_seen(
        &self,
        device: DeviceDbId,
        seen_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}
