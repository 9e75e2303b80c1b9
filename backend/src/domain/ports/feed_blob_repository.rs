//! Port for feed blob persistence.
//!
//! Each method is a single statement, so its compare-and-swap is atomic in
//! the backend. The write protocol that sequences them lives in
//! [`crate::domain::feed_blob`].

use async_trait::async_trait;

use crate::domain::{Etag, FeedBlob, UserDbId};

use super::StoreError;

/// Port for the per-chain feed blob.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedBlobRepository: Send + Sync {
    /// Fetch the chain's blob, if one was ever written.
    async fn find_feed_blob(&self, owner: UserDbId) -> Result<Option<FeedBlob>, StoreError>;

    /// Insert the blob or overwrite the chain's existing one.
    async fn upsert_feed_blob(&self, blob: &FeedBlob) -> Result<(), StoreError>;

    /// Insert the blob; an existing row fails with
    /// [`UniqueIndex::FeedBlobOwner`](super::UniqueIndex::FeedBlobOwner).
    async fn insert_feed_blob(&self, blob: &FeedBlob) -> Result<(), StoreError>;

    /// Overwrite the existing row whatever its tag; returns rows updated.
    async fn replace_feed_blob(&self, blob: &FeedBlob) -> Result<u64, StoreError>;

    /// Overwrite the existing row only while its tag is `expected`; returns
    /// rows updated.
    async fn replace_feed_blob_matching(
        &self,
        blob: &FeedBlob,
        expected: &Etag,
    ) -> Result<u64, StoreError>;
}
