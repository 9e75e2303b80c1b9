//! Port for read-mark persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ChainId, ReadMark};

use super::StoreError;

/// Port for the append-only read-mark set.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReadMarkRepository: Send + Sync {
    /// Insert a read mark.
    ///
    /// A second insert of the same identifier for the same chain fails with
    /// [`StoreError::DuplicateKey`] on
    /// [`UniqueIndex::ReadMarkIdentifier`](super::UniqueIndex::ReadMarkIdentifier).
    async fn insert_read_mark(&self, mark: &ReadMark) -> Result<(), StoreError>;

    /// Read marks of a chain updated strictly after `since`, newest read
    /// first, at most `limit` rows.
    async fn read_marks_updated_since(
        &self,
        chain: &ChainId,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ReadMark>, StoreError>;
}
