//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod chain_repository;
mod feed_blob_repository;
mod identity_repository;
mod read_mark_repository;
mod store_error;
mod transfer_repository;

#[cfg(test)]
pub use chain_repository::MockStoreHealth;
pub use chain_repository::{ChainRepository, StoreHealth};
#[cfg(test)]
pub use feed_blob_repository::MockFeedBlobRepository;
pub use feed_blob_repository::FeedBlobRepository;
#[cfg(test)]
pub use identity_repository::MockIdentityRepository;
pub use identity_repository::IdentityRepository;
#[cfg(test)]
pub use read_mark_repository::MockReadMarkRepository;
pub use read_mark_repository::ReadMarkRepository;
pub use store_error::{StoreError, UniqueIndex};
pub use transfer_repository::{EXPORT_PAGE_SIZE, ExportStream, TransferRepository};
