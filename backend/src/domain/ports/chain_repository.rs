//! The combined capability set every chain store backend provides.

use async_trait::async_trait;

use super::{
    FeedBlobRepository, IdentityRepository, ReadMarkRepository, StoreError, TransferRepository,
};

/// Liveness probe for a store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Round-trip a trivial statement through the backend.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Every port a chain store backend implements.
///
/// Services stay generic over the narrow ports they use; this trait lets
/// callers hold one backend of either kind behind a single
/// `Arc<dyn ChainRepository>`.
pub trait ChainRepository:
    IdentityRepository + ReadMarkRepository + FeedBlobRepository + TransferRepository + StoreHealth
{
}

impl<T> ChainRepository for T where
    T: IdentityRepository
        + ReadMarkRepository
        + FeedBlobRepository
        + TransferRepository
        + StoreHealth
        + ?Sized
{
}
