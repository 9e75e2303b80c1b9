//! Feed blob service: conditional reads and compare-and-swap writes.
//!
//! The service walks the [`WriteStep`] plan produced by the caller's
//! [`Precondition`]; each step is one atomic statement in the backend, so
//! concurrent writers holding the same tag cannot both win.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::ports::{FeedBlobRepository, StoreError, UniqueIndex};
use crate::domain::{
    ConditionalRead, Etag, FeedBlob, IfNoneMatch, Missing, Precondition, StepOutcome, SyncError,
    UserDbId, WriteDecision, WriteStep,
};

/// Domain service for the per-chain feed blob.
pub struct FeedBlobService<R: ?Sized> {
    repo: Arc<R>,
}

impl<R: ?Sized> Clone for FeedBlobService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R: ?Sized> FeedBlobService<R> {
    /// Create a new service over the given repository.
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }
}

const fn outcome_for_rows(rows: u64) -> StepOutcome {
    if rows == 0 {
        StepOutcome::NothingMatched
    } else {
        StepOutcome::Applied
    }
}

impl<R> FeedBlobService<R>
where
    R: FeedBlobRepository + ?Sized,
{
    /// Current blob of the chain.
    pub async fn read(&self, owner: UserDbId) -> Result<FeedBlob, SyncError> {
        self.repo
            .find_feed_blob(owner)
            .await?
            .ok_or(SyncError::NotFound(Missing::FeedBlob))
    }

    /// Revalidate a cached copy.
    pub async fn read_if_none_match(
        &self,
        owner: UserDbId,
        condition: &IfNoneMatch,
    ) -> Result<ConditionalRead, SyncError> {
        let current = self.read(owner).await?;
        Ok(ConditionalRead::evaluate(current, condition))
    }

    /// Write the chain's blob under `precondition`, returning the new tag.
    ///
    /// # Errors
    ///
    /// [`SyncError::PreconditionFailed`] when the stored version does not
    /// satisfy the precondition. The caller should re-read and retry.
    pub async fn write(
        &self,
        owner: UserDbId,
        content_hash: i64,
        content: &str,
        precondition: &Precondition,
    ) -> Result<Etag, SyncError> {
        let blob = FeedBlob {
            owner,
            content_hash,
            content: content.to_owned(),
            etag: Etag::generate(content_hash, content),
        };

        let mut step = precondition.first_step();
        loop {
            let outcome = self.execute(&step, &blob).await?;
            match step.decide(outcome) {
                WriteDecision::Committed => {
                    info!(owner = %owner, etag = %blob.etag, "feed blob written");
                    return Ok(blob.etag);
                }
                WriteDecision::Then(next) => step = next,
                WriteDecision::Rejected => {
                    debug!(owner = %owner, ?step, ?outcome, "feed blob precondition failed");
                    return Err(SyncError::PreconditionFailed);
                }
            }
        }
    }

    async fn execute(&self, step: &WriteStep, blob: &FeedBlob) -> Result<StepOutcome, StoreError> {
        match step {
            WriteStep::Upsert => self
                .repo
                .upsert_feed_blob(blob)
                .await
                .map(|()| StepOutcome::Applied),
            WriteStep::Insert => match self.repo.insert_feed_blob(blob).await {
                Ok(()) => Ok(StepOutcome::Applied),
                Err(error) if error.is_duplicate_on(UniqueIndex::FeedBlobOwner) => {
                    Ok(StepOutcome::OwnerExists)
                }
                Err(error) => Err(error),
            },
            WriteStep::ReplaceExisting => self
                .repo
                .replace_feed_blob(blob)
                .await
                .map(outcome_for_rows),
            WriteStep::ReplaceMatching(expected) => self
                .repo
                .replace_feed_blob_matching(blob, expected)
                .await
                .map(outcome_for_rows),
        }
    }
}

#[cfg(test)]
#[path = "feed_blob_service_tests.rs"]
mod tests;
