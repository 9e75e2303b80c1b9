//! Shared implementation of the chain repository ports for both backends.
//!
//! PostgreSQL and SQLite run the same Diesel queries against the same schema;
//! only the pool type and the unique-violation classifier differ. The
//! [`impl_chain_repository!`] macro stamps out every port for one adapter.

use std::future::Future;

use futures_util::{StreamExt, TryStreamExt, stream};

use crate::domain::ports::{ExportStream, StoreError};

/// Stream every row of a keyset-paginated query.
///
/// `fetch_page(after)` returns the next page of `(db_id, item)` pairs whose
/// `db_id` is greater than `after`, ascending. The stream stops at the first
/// empty page.
pub(crate) fn keyset_stream<'a, T, F, Fut>(fetch_page: F) -> ExportStream<'a, T>
where
    T: Send + 'a,
    F: Fn(i64) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Vec<(i64, T)>, StoreError>> + Send + 'a,
{
    stream::try_unfold(
        (fetch_page, Some(0_i64)),
        |(fetch_page, cursor)| async move {
            let Some(after) = cursor else {
                return Ok::<_, StoreError>(None);
            };
            let page = fetch_page(after).await?;
            let next = page.last().map(|(db_id, _)| *db_id);
            let items = stream::iter(page.into_iter().map(|(_, item)| Ok::<_, StoreError>(item)));
            Ok(Some((items, (fetch_page, next))))
        },
    )
    .try_flatten()
    .boxed()
}

/// Generate every chain repository port for a Diesel adapter.
///
/// The adapter type must have a `pool` field whose `get()` returns a pooled
/// connection or a [`PoolError`](super::pool::PoolError). The invoking module
/// must import the schema tables, the row models, the domain types named in
/// the port signatures, `diesel::prelude::*` and `diesel_async::RunQueryDsl`.
///
/// The generated methods:
/// - acquire a pooled connection per call (per page for exports)
/// - classify Diesel failures through `map_diesel_error`
/// - run registration in one transaction
macro_rules! impl_chain_repository {
    (
        impl for $repo:ty {
            map_diesel_error: $map_diesel_error:path,
        }
    ) => {
        impl $repo {
            async fn resolve_owner(&self, public_id: &ChainId) -> Result<UserDbId, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                users::table
                    .filter(users::public_id.eq(public_id.to_string()))
                    .select(users::db_id)
                    .first::<i64>(&mut conn)
                    .await
                    .optional()
                    .map_err($map_diesel_error)?
                    .map(UserDbId::new)
                    .ok_or_else(|| StoreError::missing_owner(public_id.to_string()))
            }
        }

        #[async_trait::async_trait]
        impl IdentityRepository for $repo {
            async fn register_chain(
                &self,
                user: &NewUser,
                device: &NewDevice,
            ) -> Result<(User, Device), StoreError> {
                use diesel_async::AsyncConnection as _;
                use diesel_async::scoped_futures::ScopedFutureExt as _;

                let user_row = NewUserRow::new(&user.public_id, &user.sync_code);
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;

                let (created, member) = conn
                    .transaction(|conn| {
                        async move {
                            let created: UserRow = diesel::insert_into(users::table)
                                .values(&user_row)
                                .returning(UserRow::as_returning())
                                .get_result(conn)
                                .await?;
                            let device_row = NewDeviceRow::new(
                                &device.public_id,
                                UserDbId::new(created.db_id),
                                &device.name,
                                device.legacy_id,
                                device.last_seen,
                            );
                            let member: DeviceRow = diesel::insert_into(devices::table)
                                .values(&device_row)
                                .returning(DeviceRow::as_returning())
                                .get_result(conn)
                                .await?;
                            Ok::<_, diesel::result::Error>((created, member))
                        }
                        .scope_boxed()
                    })
                    .await
                    .map_err($map_diesel_error)?;

                Ok((User::try_from(created)?, Device::try_from(member)?))
            }

            async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let row: UserRow = diesel::insert_into(users::table)
                    .values(&NewUserRow::new(&user.public_id, &user.sync_code))
                    .returning(UserRow::as_returning())
                    .get_result(&mut conn)
                    .await
                    .map_err($map_diesel_error)?;
                User::try_from(row)
            }

            async fn insert_device(
                &self,
                owner: UserDbId,
                device: &NewDevice,
            ) -> Result<Device, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let new_row = NewDeviceRow::new(
                    &device.public_id,
                    owner,
                    &device.name,
                    device.legacy_id,
                    device.last_seen,
                );
                let row: DeviceRow = diesel::insert_into(devices::table)
                    .values(&new_row)
                    .returning(DeviceRow::as_returning())
                    .get_result(&mut conn)
                    .await
                    .map_err($map_diesel_error)?;
                Device::try_from(row)
            }

            async fn find_user_by_public_id(
                &self,
                id: &ChainId,
            ) -> Result<Option<User>, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let row: Option<UserRow> = users::table
                    .filter(users::public_id.eq(id.to_string()))
                    .select(UserRow::as_select())
                    .first(&mut conn)
                    .await
                    .optional()
                    .map_err($map_diesel_error)?;
                row.map(User::try_from).transpose()
            }

            async fn find_user_by_sync_code(
                &self,
                code: &SyncCode,
            ) -> Result<Option<User>, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let row: Option<UserRow> = users::table
                    .filter(users::legacy_sync_code.eq(code.as_str()))
                    .select(UserRow::as_select())
                    .first(&mut conn)
                    .await
                    .optional()
                    .map_err($map_diesel_error)?;
                row.map(User::try_from).transpose()
            }

            async fn find_device(
                &self,
                owner: UserDbId,
                legacy_id: LegacyDeviceId,
            ) -> Result<Option<Device>, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let row: Option<DeviceRow> = devices::table
                    .filter(devices::user_db_id.eq(owner.get()))
                    .filter(devices::legacy_device_id.eq(legacy_id.get()))
                    .select(DeviceRow::as_select())
                    .first(&mut conn)
                    .await
                    .optional()
                    .map_err($map_diesel_error)?;
                row.map(Device::try_from).transpose()
            }

            async fn list_devices(&self, owner: UserDbId) -> Result<Vec<Device>, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let rows: Vec<DeviceRow> = devices::table
                    .filter(devices::user_db_id.eq(owner.get()))
                    .order(devices::db_id.asc())
                    .select(DeviceRow::as_select())
                    .load(&mut conn)
                    .await
                    .map_err($map_diesel_error)?;
                rows.into_iter().map(Device::try_from).collect()
            }

            async fn delete_device(
                &self,
                owner: UserDbId,
                legacy_id: LegacyDeviceId,
            ) -> Result<u64, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let deleted = diesel::delete(
                    devices::table
                        .filter(devices::user_db_id.eq(owner.get()))
                        .filter(devices::legacy_device_id.eq(legacy_id.get())),
                )
                .execute(&mut conn)
                .await
                .map_err($map_diesel_error)?;
                Ok(rows_affected(deleted))
            }

            async fn touch_last_seen(
                &self,
                device: DeviceDbId,
                seen_at: DateTime<Utc>,
            ) -> Result<u64, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let seen_at = to_millis(seen_at);
                let touched = diesel::update(
                    devices::table
                        .filter(devices::db_id.eq(device.get()))
                        .filter(devices::last_seen.le(seen_at)),
                )
                .set(devices::last_seen.eq(seen_at))
                .execute(&mut conn)
                .await
                .map_err($map_diesel_error)?;
                Ok(rows_affected(touched))
            }
        }

        #[async_trait::async_trait]
        impl ReadMarkRepository for $repo {
            async fn insert_read_mark(&self, mark: &ReadMark) -> Result<(), StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                diesel::insert_into(read_marks::table)
                    .values(&NewReadMarkRow::new(mark.owner, mark))
                    .execute(&mut conn)
                    .await
                    .map(|_| ())
                    .map_err($map_diesel_error)
            }

            async fn read_marks_updated_since(
                &self,
                chain: &ChainId,
                since: DateTime<Utc>,
                limit: i64,
            ) -> Result<Vec<ReadMark>, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let rows: Vec<ReadMarkRow> = read_marks::table
                    .inner_join(users::table)
                    .filter(users::public_id.eq(chain.to_string()))
                    .filter(read_marks::updated_at.gt(to_millis(since)))
                    .order(read_marks::read_time.desc())
                    .limit(limit)
                    .select(ReadMarkRow::as_select())
                    .load(&mut conn)
                    .await
                    .map_err($map_diesel_error)?;
                rows.into_iter().map(ReadMark::try_from).collect()
            }
        }

        #[async_trait::async_trait]
        impl FeedBlobRepository for $repo {
            async fn find_feed_blob(&self, owner: UserDbId) -> Result<Option<FeedBlob>, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let row: Option<FeedBlobRow> = feed_blobs::table
                    .filter(feed_blobs::user_db_id.eq(owner.get()))
                    .select(FeedBlobRow::as_select())
                    .first(&mut conn)
                    .await
                    .optional()
                    .map_err($map_diesel_error)?;
                Ok(row.map(FeedBlob::from))
            }

            async fn upsert_feed_blob(&self, blob: &FeedBlob) -> Result<(), StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                diesel::insert_into(feed_blobs::table)
                    .values(&NewFeedBlobRow::new(blob.owner, blob))
                    .on_conflict(feed_blobs::user_db_id)
                    .do_update()
                    .set((
                        feed_blobs::content_hash
                            .eq(diesel::upsert::excluded(feed_blobs::content_hash)),
                        feed_blobs::content.eq(diesel::upsert::excluded(feed_blobs::content)),
                        feed_blobs::etag.eq(diesel::upsert::excluded(feed_blobs::etag)),
                    ))
                    .execute(&mut conn)
                    .await
                    .map(|_| ())
                    .map_err($map_diesel_error)
            }

            async fn insert_feed_blob(&self, blob: &FeedBlob) -> Result<(), StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                diesel::insert_into(feed_blobs::table)
                    .values(&NewFeedBlobRow::new(blob.owner, blob))
                    .execute(&mut conn)
                    .await
                    .map(|_| ())
                    .map_err($map_diesel_error)
            }

            async fn replace_feed_blob(&self, blob: &FeedBlob) -> Result<u64, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let replaced = diesel::update(
                    feed_blobs::table.filter(feed_blobs::user_db_id.eq(blob.owner.get())),
                )
                .set((
                    feed_blobs::content_hash.eq(blob.content_hash),
                    feed_blobs::content.eq(blob.content.as_str()),
                    feed_blobs::etag.eq(blob.etag.as_str()),
                ))
                .execute(&mut conn)
                .await
                .map_err($map_diesel_error)?;
                Ok(rows_affected(replaced))
            }

            async fn replace_feed_blob_matching(
                &self,
                blob: &FeedBlob,
                expected: &Etag,
            ) -> Result<u64, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let replaced = diesel::update(
                    feed_blobs::table
                        .filter(feed_blobs::user_db_id.eq(blob.owner.get()))
                        .filter(feed_blobs::etag.eq(expected.as_str())),
                )
                .set((
                    feed_blobs::content_hash.eq(blob.content_hash),
                    feed_blobs::content.eq(blob.content.as_str()),
                    feed_blobs::etag.eq(blob.etag.as_str()),
                ))
                .execute(&mut conn)
                .await
                .map_err($map_diesel_error)?;
                Ok(rows_affected(replaced))
            }
        }

        #[async_trait::async_trait]
        impl TransferRepository for $repo {
            fn export_users(&self) -> ExportStream<'_, User> {
                keyset_stream(move |after| async move {
                    let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                    let rows: Vec<UserRow> = users::table
                        .filter(users::db_id.gt(after))
                        .order(users::db_id.asc())
                        .limit(EXPORT_PAGE_SIZE)
                        .select(UserRow::as_select())
                        .load(&mut conn)
                        .await
                        .map_err($map_diesel_error)?;
                    rows.into_iter()
                        .map(|row| Ok((row.db_id, User::try_from(row)?)))
                        .collect::<Result<Vec<_>, StoreError>>()
                })
            }

            fn export_devices_for_user<'a>(&'a self, user: &'a User) -> ExportStream<'a, Device> {
                let owner = user.db_id.get();
                keyset_stream(move |after| async move {
                    let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                    let rows: Vec<DeviceRow> = devices::table
                        .filter(devices::user_db_id.eq(owner))
                        .filter(devices::db_id.gt(after))
                        .order(devices::db_id.asc())
                        .limit(EXPORT_PAGE_SIZE)
                        .select(DeviceRow::as_select())
                        .load(&mut conn)
                        .await
                        .map_err($map_diesel_error)?;
                    rows.into_iter()
                        .map(|row| Ok((row.db_id, Device::try_from(row)?)))
                        .collect::<Result<Vec<_>, StoreError>>()
                })
            }

            async fn export_feed_blob(&self, user: &User) -> Result<Option<FeedBlob>, StoreError> {
                self.find_feed_blob(user.db_id).await
            }

            fn export_read_marks<'a>(&'a self, user: &'a User) -> ExportStream<'a, ReadMark> {
                let owner = user.db_id.get();
                keyset_stream(move |after| async move {
                    let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                    let rows: Vec<ReadMarkRow> = read_marks::table
                        .filter(read_marks::user_db_id.eq(owner))
                        .filter(read_marks::db_id.gt(after))
                        .order(read_marks::db_id.asc())
                        .limit(EXPORT_PAGE_SIZE)
                        .select(ReadMarkRow::as_select())
                        .load(&mut conn)
                        .await
                        .map_err($map_diesel_error)?;
                    rows.into_iter()
                        .map(|row| Ok((row.db_id, ReadMark::try_from(row)?)))
                        .collect::<Result<Vec<_>, StoreError>>()
                })
            }

            async fn import_user(&self, user: &User) -> Result<User, StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let row: UserRow = diesel::insert_into(users::table)
                    .values(&NewUserRow::new(&user.public_id, &user.sync_code))
                    .returning(UserRow::as_returning())
                    .get_result(&mut conn)
                    .await
                    .map_err($map_diesel_error)?;
                User::try_from(row)
            }

            async fn import_device(
                &self,
                owner: &ChainId,
                device: &Device,
            ) -> Result<Device, StoreError> {
                let owner = self.resolve_owner(owner).await?;
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                let new_row = NewDeviceRow::new(
                    &device.public_id,
                    owner,
                    &device.name,
                    device.legacy_id,
                    device.last_seen,
                );
                let row: DeviceRow = diesel::insert_into(devices::table)
                    .values(&new_row)
                    .returning(DeviceRow::as_returning())
                    .get_result(&mut conn)
                    .await
                    .map_err($map_diesel_error)?;
                Device::try_from(row)
            }

            async fn import_feed_blob(
                &self,
                owner: &ChainId,
                blob: &FeedBlob,
            ) -> Result<(), StoreError> {
                let owner = self.resolve_owner(owner).await?;
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                diesel::insert_into(feed_blobs::table)
                    .values(&NewFeedBlobRow::new(owner, blob))
                    .execute(&mut conn)
                    .await
                    .map(|_| ())
                    .map_err($map_diesel_error)
            }

            async fn import_read_mark(
                &self,
                owner: &ChainId,
                mark: &ReadMark,
            ) -> Result<(), StoreError> {
                let owner = self.resolve_owner(owner).await?;
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                diesel::insert_into(read_marks::table)
                    .values(&NewReadMarkRow::new(owner, mark))
                    .on_conflict((read_marks::user_db_id, read_marks::identifier))
                    .do_nothing()
                    .execute(&mut conn)
                    .await
                    .map(|_| ())
                    .map_err($map_diesel_error)
            }
        }

        #[async_trait::async_trait]
        impl StoreHealth for $repo {
            async fn ping(&self) -> Result<(), StoreError> {
                let mut conn = self.pool.get().await.map_err(map_pool_error)?;
                diesel::sql_query("SELECT 1")
                    .execute(&mut conn)
                    .await
                    .map(|_| ())
                    .map_err($map_diesel_error)
            }
        }
    };
}

pub(crate) use impl_chain_repository;

/// Convert a Diesel affected-row count into the port's `u64`.
pub(crate) fn rows_affected(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}
