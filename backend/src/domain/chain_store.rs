//! Facade bundling every chain service over one repository.
//!
//! Request handlers hold a [`ChainStore`] and call into its services. Each
//! call is an ordinary future: dropping it cancels the operation, and
//! [`with_deadline`] bounds it in time.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;

use crate::domain::ports::ChainRepository;
use crate::domain::{
    FeedBlobService, IdentityService, MigrationReconciler, ReadMarkService, SyncError,
};

/// Run `operation`, abandoning it with [`SyncError::Timeout`] after
/// `deadline`.
///
/// Single-statement operations either commit or not; an abandoned
/// registration rolls back. Reconciliation may stop between its two inserts,
/// which a replay completes.
pub async fn with_deadline<T, F>(deadline: Duration, operation: F) -> Result<T, SyncError>
where
    F: Future<Output = Result<T, SyncError>>,
{
    tokio::time::timeout(deadline, operation)
        .await
        .unwrap_or(Err(SyncError::Timeout))
}

/// All chain services sharing one backend.
pub struct ChainStore<R: ?Sized> {
    pub identity: IdentityService<R>,
    pub read_marks: ReadMarkService<R>,
    pub feed_blobs: FeedBlobService<R>,
    pub reconciler: MigrationReconciler<R>,
    repo: Arc<R>,
}

impl<R: ?Sized> Clone for ChainStore<R> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            read_marks: self.read_marks.clone(),
            feed_blobs: self.feed_blobs.clone(),
            reconciler: self.reconciler.clone(),
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R> ChainStore<R>
where
    R: ChainRepository + ?Sized,
{
    /// Wire every service to `repo`.
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            identity: IdentityService::new(Arc::clone(&repo), Arc::clone(&clock)),
            read_marks: ReadMarkService::new(Arc::clone(&repo), Arc::clone(&clock)),
            feed_blobs: FeedBlobService::new(Arc::clone(&repo)),
            reconciler: MigrationReconciler::new(Arc::clone(&repo), clock),
            repo,
        }
    }

    /// The underlying repository, for transfers and health checks.
    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Check that the backend answers.
    pub async fn ping(&self) -> Result<(), SyncError> {
        Ok(self.repo.ping().await?)
    }
}
