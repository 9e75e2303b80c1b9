//! Domain primitives, decision logic and services.
//!
//! Purpose: model sync chains (a user plus its devices), their read marks and
//! their feed blob, and enforce the consistency rules between them. Types are
//! storage agnostic; adapters reach the domain only through [`ports`].
//!
//! Public surface:
//! - Identity types (`User`, `Device`, `ChainId`, `SyncCode`, ...).
//! - Feed blob protocol (`Etag`, `Precondition`, `WriteStep`, ...).
//! - Services (`IdentityService`, `ReadMarkService`, `FeedBlobService`,
//!   `MigrationReconciler`, `StoreTransfer`) and the `ChainStore` facade.
//! - `SyncError` and `ErrorCode`, the closed error taxonomy.

pub mod chain;
pub mod chain_store;
pub mod devices_fingerprint;
pub mod error;
pub mod feed_blob;
pub mod feed_blob_service;
pub mod identity_service;
pub mod migration_reconciler;
pub mod ports;
pub mod read_mark;
pub mod read_mark_service;
pub mod store_transfer;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::chain::{
    ChainId, ChainKey, ChainValidationError, Device, DeviceDbId, DeviceId, LegacyDeviceId,
    NewDevice, NewUser, SYNC_CODE_LENGTH, SyncCode, User, UserDbId,
};
pub use self::chain_store::{ChainStore, with_deadline};
pub use self::devices_fingerprint::DevicesFingerprint;
pub use self::error::{ErrorCode, Missing, SyncError};
pub use self::feed_blob::{
    ConditionalRead, Etag, EtagError, FeedBlob, IfNoneMatch, Precondition, StepOutcome,
    WriteDecision, WriteStep,
};
pub use self::feed_blob_service::FeedBlobService;
pub use self::identity_service::IdentityService;
pub use self::migration_reconciler::{MigrationOutcome, MigrationReconciler};
pub use self::read_mark::{
    ArticleIdentifier, ArticleIdentifierError, READ_MARK_PAGE_LIMIT, ReadMark, ReadMarkInsert,
};
pub use self::read_mark_service::ReadMarkService;
pub use self::store_transfer::{StoreTransfer, TransferOptions, TransferReport};
