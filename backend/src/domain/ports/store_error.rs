//! Storage errors shared by every chain repository port.
//!
//! Adapters classify native driver failures into these variants at their
//! boundary. In particular, a unique-constraint violation is reported as
//! [`StoreError::DuplicateKey`] naming the [`UniqueIndex`] that fired, so
//! callers branch on the tag rather than on driver message text.

use std::fmt;

use super::define_port_error;

/// Unique indexes the chain schema declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniqueIndex {
    /// `users.legacy_sync_code`
    UserSyncCode,
    /// `users.public_id`
    UserPublicId,
    /// `devices.public_id`
    DevicePublicId,
    /// `devices (user_db_id, legacy_device_id)`
    DeviceLegacyId,
    /// `feed_blobs.user_db_id`
    FeedBlobOwner,
    /// `read_marks (user_db_id, identifier)`
    ReadMarkIdentifier,
    /// A violation the adapter could not attribute to a known index.
    Unknown,
}

impl UniqueIndex {
    const NAMED: [Self; 6] = [
        Self::UserSyncCode,
        Self::UserPublicId,
        Self::DevicePublicId,
        Self::DeviceLegacyId,
        Self::FeedBlobOwner,
        Self::ReadMarkIdentifier,
    ];

    /// Index name as declared in the migrations.
    pub const fn index_name(self) -> &'static str {
        match self {
            Self::UserSyncCode => "idx_users_legacy_sync_code",
            Self::UserPublicId => "idx_users_user_id",
            Self::DevicePublicId => "idx_devices_device_id",
            Self::DeviceLegacyId => "idx_devices_user_db_id_legacy_device_id",
            Self::FeedBlobOwner => "idx_feed_blobs_user_db_id",
            Self::ReadMarkIdentifier => "idx_read_marks_user_db_id_identifier",
            Self::Unknown => "unknown",
        }
    }

    /// Resolve an index from its declared name.
    pub fn from_index_name(name: &str) -> Self {
        Self::NAMED
            .into_iter()
            .find(|index| index.index_name() == name)
            .unwrap_or(Self::Unknown)
    }

    /// Qualified `table.column` list the index covers, in declaration order.
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::UserSyncCode => &["users.legacy_sync_code"],
            Self::UserPublicId => &["users.public_id"],
            Self::DevicePublicId => &["devices.public_id"],
            Self::DeviceLegacyId => &["devices.user_db_id", "devices.legacy_device_id"],
            Self::FeedBlobOwner => &["feed_blobs.user_db_id"],
            Self::ReadMarkIdentifier => &["read_marks.user_db_id", "read_marks.identifier"],
            Self::Unknown => &[],
        }
    }

    /// Resolve an index from the columns a violation names.
    pub fn from_columns<'a>(columns: impl IntoIterator<Item = &'a str>) -> Self {
        let named: Vec<&str> = columns.into_iter().map(str::trim).collect();
        Self::NAMED
            .into_iter()
            .find(|index| index.columns() == named.as_slice())
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for UniqueIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.index_name())
    }
}

define_port_error! {
    /// Errors raised by chain repository adapters.
    pub enum StoreError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "chain store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "chain store query failed: {message}",
        /// An insert collided with an existing row on a unique index.
        DuplicateKey { index: UniqueIndex } =>
            "duplicate key on {index}",
        /// An import referenced a chain that does not exist in this store.
        MissingOwner { public_id: String } =>
            "no chain with public id {public_id}",
    }
}

impl StoreError {
    /// Returns true when this is a duplicate-key error on `index`.
    pub fn is_duplicate_on(&self, index: UniqueIndex) -> bool {
        matches!(self, Self::DuplicateKey { index: found } if *found == index)
    }
}
