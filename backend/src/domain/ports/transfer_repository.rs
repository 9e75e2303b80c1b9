//! Port for bulk export and import between chain stores.
//!
//! Exports are lazy, finite streams. They cannot resume mid-stream: calling
//! the export again restarts it from the first row. Imports preserve public
//! identifiers, legacy identifiers and etags exactly. Owners are re-resolved
//! by [`ChainId`] because surrogate keys differ between stores.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::domain::{ChainId, Device, FeedBlob, ReadMark, User};

use super::StoreError;

/// Stream of exported rows.
pub type ExportStream<'a, T> = BoxStream<'a, Result<T, StoreError>>;

/// Rows fetched per page while streaming an export.
pub const EXPORT_PAGE_SIZE: i64 = 500;

/// Port for moving a store's content into another store.
#[async_trait]
pub trait TransferRepository: Send + Sync {
    /// Every user, in surrogate-key order.
    fn export_users(&self) -> ExportStream<'_, User>;

    /// Every device of `user`, in surrogate-key order.
    fn export_devices_for_user<'a>(&'a self, user: &'a User) -> ExportStream<'a, Device>;

    /// The blob of `user`, if any.
    async fn export_feed_blob(&self, user: &User) -> Result<Option<FeedBlob>, StoreError>;

    /// Every read mark of `user`, in surrogate-key order.
    fn export_read_marks<'a>(&'a self, user: &'a User) -> ExportStream<'a, ReadMark>;

    /// Store `user` with its public id and sync code unchanged.
    ///
    /// The returned value carries this store's surrogate key.
    async fn import_user(&self, user: &User) -> Result<User, StoreError>;

    /// Store `device` under the chain identified by `owner`.
    async fn import_device(&self, owner: &ChainId, device: &Device) -> Result<Device, StoreError>;

    /// Store `blob` under the chain identified by `owner`.
    async fn import_feed_blob(&self, owner: &ChainId, blob: &FeedBlob) -> Result<(), StoreError>;

    /// Store `mark` under the chain identified by `owner`.
    ///
    /// Importing a mark the chain already has is a no-op.
    async fn import_read_mark(&self, owner: &ChainId, mark: &ReadMark) -> Result<(), StoreError>;
}
