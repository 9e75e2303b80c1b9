//! Chain identity and membership service.
//!
//! Registration, joining, removal and liveness tracking for the devices of a
//! chain. Uniqueness races are settled by the backend's unique indexes; this
//! service never retries.

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, info};

use crate::domain::ports::IdentityRepository;
use crate::domain::{
    ChainId, ChainKey, Device, DevicesFingerprint, LegacyDeviceId, Missing, NewDevice, NewUser,
    SyncCode, SyncError, User, UserDbId,
};

/// Domain service for chain membership.
pub struct IdentityService<R: ?Sized> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: ?Sized> Clone for IdentityService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R: ?Sized> IdentityService<R> {
    /// Create a new service over the given repository.
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }
}

impl<R> IdentityService<R>
where
    R: IdentityRepository + ?Sized,
{
    /// Create a chain with a fresh sync code and its first device.
    ///
    /// Both rows are written in one transaction. A unique-index collision
    /// (practically unreachable for generated values) surfaces as a storage
    /// error rather than being retried.
    pub async fn register_chain(&self, device_name: &str) -> Result<(User, Device), SyncError> {
        let (user, device) = {
            let mut rng = rand::thread_rng();
            (
                NewUser::with_sync_code(SyncCode::generate(&mut rng)),
                NewDevice::new(
                    device_name,
                    LegacyDeviceId::generate(&mut rng),
                    self.clock.utc(),
                ),
            )
        };

        let (user, device) = self.repo.register_chain(&user, &device).await?;
        info!(chain = %user.public_id, device = %device.public_id, "registered chain");
        Ok((user, device))
    }

    /// Add a device to an existing chain addressed by either key.
    pub async fn join_chain(&self, key: &ChainKey, device_name: &str) -> Result<Device, SyncError> {
        let user = self.find_chain(key).await?;
        let device = {
            let mut rng = rand::thread_rng();
            NewDevice::new(
                device_name,
                LegacyDeviceId::generate(&mut rng),
                self.clock.utc(),
            )
        };

        let device = self.repo.insert_device(user.db_id, &device).await?;
        info!(chain = %user.public_id, device = %device.public_id, "device joined chain");
        Ok(device)
    }

    /// Resolve a chain by public id or sync code.
    pub async fn find_chain(&self, key: &ChainKey) -> Result<User, SyncError> {
        let found = match key {
            ChainKey::Public(id) => self.repo.find_user_by_public_id(id).await?,
            ChainKey::SyncCode(code) => self.repo.find_user_by_sync_code(code).await?,
        };
        found.ok_or(SyncError::NotFound(Missing::Chain))
    }

    /// Resolve the calling device within an already resolved chain.
    pub async fn find_device(
        &self,
        user: &User,
        legacy_id: LegacyDeviceId,
    ) -> Result<Device, SyncError> {
        self.repo
            .find_device(user.db_id, legacy_id)
            .await?
            .ok_or(SyncError::NotFound(Missing::Device))
    }

    /// All devices of a chain; an unknown chain has none.
    pub async fn list_devices(&self, chain: &ChainId) -> Result<Vec<Device>, SyncError> {
        match self.repo.find_user_by_public_id(chain).await? {
            Some(user) => Ok(self.repo.list_devices(user.db_id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Remove a device, returning how many rows went away.
    ///
    /// Zero means the device had already left; callers report that to the
    /// user rather than treating it as a failure.
    pub async fn remove_device(
        &self,
        owner: UserDbId,
        legacy_id: LegacyDeviceId,
    ) -> Result<u64, SyncError> {
        let removed = self.repo.delete_device(owner, legacy_id).await?;
        info!(owner = %owner, legacy_id = %legacy_id, removed, "removed device");
        Ok(removed)
    }

    /// Record that `device` was just active.
    ///
    /// Callers usually log and discard a failure here: it must not block the
    /// request that triggered it.
    pub async fn touch_last_seen(&self, device: &Device) -> Result<(), SyncError> {
        let touched = self
            .repo
            .touch_last_seen(device.db_id, self.clock.utc())
            .await?;
        if touched == 0 {
            debug!(device = %device.public_id, "last seen not advanced");
        }
        Ok(())
    }

    /// Fingerprint of the chain's device membership.
    pub async fn devices_fingerprint(
        &self,
        chain: &ChainId,
    ) -> Result<DevicesFingerprint, SyncError> {
        let user = self
            .repo
            .find_user_by_public_id(chain)
            .await?
            .ok_or(SyncError::NotFound(Missing::Chain))?;
        let devices = self.repo.list_devices(user.db_id).await?;
        Ok(DevicesFingerprint::of(&devices))
    }
}

#[cfg(test)]
#[path = "identity_service_tests.rs"]
mod tests;
