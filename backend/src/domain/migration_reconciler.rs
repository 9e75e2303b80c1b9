//! Folds legacy `(sync code, device id)` pairs into the identity store.
//!
//! The legacy system may replay the same request any number of times, so
//! [`MigrationReconciler::ensure_migration`] is an insert-then-detect-conflict
//! upsert: each insert either creates a row or collides with the unique index
//! that proves the row already exists. The two inserts are separate
//! statements; an interrupted call leaves a user with no device, which the
//! next replay completes.

use std::sync::Arc;

use mockable::Clock;
use tracing::info;

use crate::domain::ports::{IdentityRepository, UniqueIndex};
use crate::domain::{LegacyDeviceId, NewDevice, NewUser, SyncCode, SyncError, User};

/// What one reconciliation call created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationOutcome {
    pub user_created: bool,
    pub device_created: bool,
}

impl MigrationOutcome {
    /// Rows created by this call: 0, 1 or 2.
    pub const fn rows_created(self) -> u8 {
        self.user_created as u8 + self.device_created as u8
    }
}

/// Idempotent legacy identity reconciler.
pub struct MigrationReconciler<R: ?Sized> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: ?Sized> Clone for MigrationReconciler<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R: ?Sized> MigrationReconciler<R> {
    /// Create a reconciler over the given repository.
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }
}

impl<R> MigrationReconciler<R>
where
    R: IdentityRepository + ?Sized,
{
    /// Ensure the legacy chain and device exist, reporting what this call
    /// created.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidArgument`] when `sync_code` is not 64
    ///   characters.
    /// - [`SyncError::Internal`] when the sync code collides but no user can
    ///   be found for it.
    /// - [`SyncError::Storage`] for any other backend failure.
    pub async fn ensure_migration(
        &self,
        sync_code: &str,
        legacy_id: LegacyDeviceId,
        device_name: &str,
    ) -> Result<MigrationOutcome, SyncError> {
        let sync_code = SyncCode::parse(sync_code)?;
        let mut outcome = MigrationOutcome::default();

        let user = match self.repo.insert_user(&NewUser::with_sync_code(sync_code.clone())).await
        {
            Ok(user) => {
                outcome.user_created = true;
                user
            }
            Err(error) if error.is_duplicate_on(UniqueIndex::UserSyncCode) => {
                self.existing_user(&sync_code).await?
            }
            Err(error) => return Err(error.into()),
        };

        let device = NewDevice::new(device_name, legacy_id, self.clock.utc());
        match self.repo.insert_device(user.db_id, &device).await {
            Ok(_) => outcome.device_created = true,
            Err(error) if error.is_duplicate_on(UniqueIndex::DeviceLegacyId) => {}
            Err(error) => return Err(error.into()),
        }

        if outcome.rows_created() > 0 {
            info!(
                chain = %user.public_id,
                legacy_id = %legacy_id,
                user_created = outcome.user_created,
                device_created = outcome.device_created,
                "migrated legacy identity"
            );
        }
        Ok(outcome)
    }

    async fn existing_user(&self, sync_code: &SyncCode) -> Result<User, SyncError> {
        self.repo
            .find_user_by_sync_code(sync_code)
            .await?
            .ok_or_else(|| SyncError::internal("sync code collided but no user holds it"))
    }
}
