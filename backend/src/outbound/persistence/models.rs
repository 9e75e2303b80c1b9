//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Every row is checked against both backends
//! so the shared repository code compiles for either connection type.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::ports::StoreError;
use crate::domain::{
    ArticleIdentifier, ChainId, Device, DeviceDbId, DeviceId, Etag, FeedBlob, LegacyDeviceId,
    ReadMark, SyncCode, User, UserDbId,
};

use super::schema::{devices, feed_blobs, read_marks, users};

/// Convert stored unix milliseconds into a timestamp.
pub(crate) fn from_millis(millis: i64, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::query(format!("{column} out of range: {millis}")))
}

/// Convert a timestamp into stored unix milliseconds.
pub(crate) fn to_millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

// ---------------------------------------------------------------------------
// users
// ---------------------------------------------------------------------------

/// Row struct for reading from the users table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg, diesel::sqlite::Sqlite))]
pub(crate) struct UserRow {
    pub db_id: i64,
    pub public_id: String,
    pub legacy_sync_code: String,
}

/// Insertable struct for creating user rows.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub public_id: String,
    pub legacy_sync_code: &'a str,
}

impl<'a> NewUserRow<'a> {
    pub(crate) fn new(public_id: &ChainId, sync_code: &'a SyncCode) -> Self {
        Self {
            public_id: public_id.to_string(),
            legacy_sync_code: sync_code.as_str(),
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let public_id = ChainId::parse(&row.public_id).map_err(|err| {
            StoreError::query(format!("corrupted user public id in database: {err}"))
        })?;
        let sync_code = SyncCode::parse(row.legacy_sync_code).map_err(|err| {
            StoreError::query(format!("corrupted sync code in database: {err}"))
        })?;
        Ok(Self {
            db_id: UserDbId::new(row.db_id),
            public_id,
            sync_code,
        })
    }
}

// ---------------------------------------------------------------------------
// devices
// ---------------------------------------------------------------------------

/// Row struct for reading from the devices table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = devices)]
#[diesel(check_for_backend(diesel::pg::Pg, diesel::sqlite::Sqlite))]
pub(crate) struct DeviceRow {
    pub db_id: i64,
    pub public_id: String,
    pub user_db_id: i64,
    pub device_name: String,
    pub legacy_device_id: i64,
    pub last_seen: i64,
}

/// Insertable struct for creating device rows.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = devices)]
pub(crate) struct NewDeviceRow<'a> {
    pub public_id: String,
    pub user_db_id: i64,
    pub device_name: &'a str,
    pub legacy_device_id: i64,
    pub last_seen: i64,
}

impl<'a> NewDeviceRow<'a> {
    pub(crate) fn new(
        public_id: &DeviceId,
        owner: UserDbId,
        name: &'a str,
        legacy_id: LegacyDeviceId,
        last_seen: DateTime<Utc>,
    ) -> Self {
        Self {
            public_id: public_id.to_string(),
            user_db_id: owner.get(),
            device_name: name,
            legacy_device_id: legacy_id.get(),
            last_seen: to_millis(last_seen),
        }
    }
}

impl TryFrom<DeviceRow> for Device {
    type Error = StoreError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        let public_id = DeviceId::parse(&row.public_id).map_err(|err| {
            StoreError::query(format!("corrupted device public id in database: {err}"))
        })?;
        Ok(Self {
            db_id: DeviceDbId::new(row.db_id),
            public_id,
            owner: UserDbId::new(row.user_db_id),
            name: row.device_name,
            legacy_id: LegacyDeviceId::new(row.legacy_device_id),
            last_seen: from_millis(row.last_seen, "devices.last_seen")?,
        })
    }
}

// ---------------------------------------------------------------------------
// read_marks
// ---------------------------------------------------------------------------

/// Row struct for reading from the read_marks table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = read_marks)]
#[diesel(check_for_backend(diesel::pg::Pg, diesel::sqlite::Sqlite))]
pub(crate) struct ReadMarkRow {
    pub db_id: i64,
    pub user_db_id: i64,
    pub identifier: String,
    pub read_time: i64,
    pub updated_at: i64,
}

/// Insertable struct for creating read mark rows.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = read_marks)]
pub(crate) struct NewReadMarkRow<'a> {
    pub user_db_id: i64,
    pub identifier: &'a str,
    pub read_time: i64,
    pub updated_at: i64,
}

impl<'a> NewReadMarkRow<'a> {
    pub(crate) fn new(owner: UserDbId, mark: &'a ReadMark) -> Self {
        Self {
            user_db_id: owner.get(),
            identifier: mark.identifier.as_str(),
            read_time: to_millis(mark.read_time),
            updated_at: to_millis(mark.updated_at),
        }
    }
}

impl TryFrom<ReadMarkRow> for ReadMark {
    type Error = StoreError;

    fn try_from(row: ReadMarkRow) -> Result<Self, Self::Error> {
        let identifier = ArticleIdentifier::new(row.identifier).map_err(|err| {
            StoreError::query(format!("corrupted read mark in database: {err}"))
        })?;
        Ok(Self {
            owner: UserDbId::new(row.user_db_id),
            identifier,
            read_time: from_millis(row.read_time, "read_marks.read_time")?,
            updated_at: from_millis(row.updated_at, "read_marks.updated_at")?,
        })
    }
}

// ---------------------------------------------------------------------------
// feed_blobs
// ---------------------------------------------------------------------------

/// Row struct for reading from the feed_blobs table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = feed_blobs)]
#[diesel(check_for_backend(diesel::pg::Pg, diesel::sqlite::Sqlite))]
pub(crate) struct FeedBlobRow {
    pub user_db_id: i64,
    pub content_hash: i64,
    pub content: String,
    pub etag: String,
}

/// Insertable struct for creating feed blob rows.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = feed_blobs)]
pub(crate) struct NewFeedBlobRow<'a> {
    pub user_db_id: i64,
    pub content_hash: i64,
    pub content: &'a str,
    pub etag: &'a str,
}

impl<'a> NewFeedBlobRow<'a> {
    pub(crate) fn new(owner: UserDbId, blob: &'a FeedBlob) -> Self {
        Self {
            user_db_id: owner.get(),
            content_hash: blob.content_hash,
            content: blob.content.as_str(),
            etag: blob.etag.as_str(),
        }
    }
}

impl From<FeedBlobRow> for FeedBlob {
    fn from(row: FeedBlobRow) -> Self {
        Self {
            owner: UserDbId::new(row.user_db_id),
            content_hash: row.content_hash,
            content: row.content,
            etag: Etag::from_storage(row.etag),
        }
    }
}
