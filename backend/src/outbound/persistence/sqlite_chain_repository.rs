//! SQLite-backed chain repository.
//!
//! Implements every chain repository port over the single pooled SQLite
//! connection. Unique violations are classified by the column list in
//! SQLite's error message. Foreign keys are enforced per connection, so the
//! pool's setup hook must have run before any query here.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{
    EXPORT_PAGE_SIZE, ExportStream, FeedBlobRepository, IdentityRepository, ReadMarkRepository,
    StoreError, StoreHealth, TransferRepository,
};
use crate::domain::{
    ChainId, Device, DeviceDbId, Etag, FeedBlob, LegacyDeviceId, NewDevice, NewUser, ReadMark,
    SyncCode, User, UserDbId,
};

use super::chain_repository_macros::{impl_chain_repository, keyset_stream, rows_affected};
use super::error_mapping::{map_pool_error, map_sqlite_diesel_error};
use super::models::{
    DeviceRow, FeedBlobRow, NewDeviceRow, NewFeedBlobRow, NewReadMarkRow, NewUserRow, ReadMarkRow,
    UserRow, to_millis,
};
use super::pool::SqlitePool;
use super::schema::{devices, feed_blobs, read_marks, users};

/// Chain store adapter over a single SQLite connection.
///
/// # Example
///
/// ```ignore
/// let pool = SqlitePool::new(PoolConfig::new("/var/lib/chainsync/chains.db")).await?;
/// let repo = SqliteChainRepository::new(pool);
/// ```
#[derive(Clone)]
pub struct SqliteChainRepository {
    pool: SqlitePool,
}

impl SqliteChainRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl_chain_repository! {
    impl for SqliteChainRepository {
        map_diesel_error: map_sqlite_diesel_error,
    }
}
