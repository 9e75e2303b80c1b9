//! Read-mark service: deduplicated, append-only per-chain marks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use tracing::debug;

use crate::domain::ports::{ReadMarkRepository, UniqueIndex};
use crate::domain::{
    ArticleIdentifier, ChainId, READ_MARK_PAGE_LIMIT, ReadMark, ReadMarkInsert, SyncError,
    UserDbId,
};

/// Domain service for read marks.
pub struct ReadMarkService<R: ?Sized> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: ?Sized> Clone for ReadMarkService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R: ?Sized> ReadMarkService<R> {
    /// Create a new service over the given repository.
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }
}

impl<R> ReadMarkService<R>
where
    R: ReadMarkRepository + ?Sized,
{
    /// Mark `identifier` as read for the chain.
    ///
    /// Marking an identifier the chain already has is a silent no-op.
    pub async fn add_read_mark(
        &self,
        owner: UserDbId,
        identifier: &str,
    ) -> Result<ReadMarkInsert, SyncError> {
        let now = self.clock.utc();
        let mark = ReadMark {
            owner,
            identifier: ArticleIdentifier::new(identifier)?,
            read_time: now,
            updated_at: now,
        };

        match self.repo.insert_read_mark(&mark).await {
            Ok(()) => Ok(ReadMarkInsert::Inserted),
            Err(error) if error.is_duplicate_on(UniqueIndex::ReadMarkIdentifier) => {
                debug!(owner = %owner, "read mark already present");
                Ok(ReadMarkInsert::AlreadyPresent)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Marks updated after `since`, newest read first, capped at
    /// [`READ_MARK_PAGE_LIMIT`].
    pub async fn read_marks_since(
        &self,
        chain: &ChainId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ReadMark>, SyncError> {
        Ok(self
            .repo
            .read_marks_updated_since(chain, since, READ_MARK_PAGE_LIMIT)
            .await?)
    }
}
