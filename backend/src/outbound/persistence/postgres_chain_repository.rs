//! PostgreSQL-backed chain repository.
//!
//! Implements every chain repository port over a pooled `AsyncPgConnection`.
//! Unique violations are classified by the index name PostgreSQL reports.

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
use super::error_mapping::{map_pg_diesel_error, map_pool_error};
use super::models::{
    DeviceRow, FeedBlobRow, NewDeviceRow, NewFeedBlobRow, NewReadMarkRow, NewUserRow, ReadMarkRow,
    UserRow, to_millis,
};
use super::pool::PgPool;
use super::schema::{devices, feed_blobs, read_marks, users};

/// Chain store adapter over a PostgreSQL connection pool.
///
/// # Example
///
/// ```ignore
/// let pool = PgPool::new(PoolConfig::new("postgres://localhost/chains")).await?;
/// let repo = PostgresChainRepository::new(pool);
/// ```
#[derive(Clone)]
pub struct PostgresChainRepository {
    pool: PgPool,
}

impl PostgresChainRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl_chain_repository! {
    impl for PostgresChainRepository {
        map_diesel_error: map_pg_diesel_error,
    }
}
