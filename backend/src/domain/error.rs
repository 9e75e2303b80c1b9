//! Domain-level error types.
//!
//! These errors are transport agnostic. An HTTP collaborator maps
//! [`SyncError::code`] onto status codes; nothing should inspect the
//! rendered message.

use serde::{Deserialize, Serialize};

use super::chain::ChainValidationError;
use super::feed_blob::EtagError;
use super::read_mark::ArticleIdentifierError;
use crate::domain::ports::StoreError;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The chain, device or blob does not exist.
    NotFound,
    /// The feed blob changed since the caller last read it.
    PreconditionFailed,
    /// The request is malformed or fails validation.
    InvalidArgument,
    /// The caller's deadline passed before the store answered.
    Timeout,
    /// The storage backend failed.
    StorageError,
    /// An unexpected inconsistency inside the domain.
    InternalError,
}

/// Which entity a [`SyncError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Missing {
    /// No user matched the supplied chain key.
    Chain,
    /// No device matched within the chain.
    Device,
    /// The chain has never written a feed blob.
    FeedBlob,
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Chain => "no such chain",
            Self::Device => "device not registered",
            Self::FeedBlob => "no feed blob stored",
        })
    }
}

/// Errors returned by the chain services.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// A chain, device or feed blob does not exist.
    #[error("{0}")]
    NotFound(Missing),
    /// An optimistic-concurrency precondition did not hold.
    #[error("precondition failed")]
    PreconditionFailed,
    /// Caller input failed validation.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    /// The operation exceeded its deadline and was abandoned.
    #[error("operation timed out")]
    Timeout,
    /// The store reached a state that should be impossible.
    #[error("internal error: {message}")]
    Internal { message: String },
    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl SyncError {
    /// Build an [`SyncError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Build an [`SyncError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::PreconditionFailed => ErrorCode::PreconditionFailed,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::Timeout => ErrorCode::Timeout,
            Self::Internal { .. } => ErrorCode::InternalError,
            Self::Storage(_) => ErrorCode::StorageError,
        }
    }
}

impl From<ChainValidationError> for SyncError {
    fn from(value: ChainValidationError) -> Self {
        Self::invalid_argument(value.to_string())
    }
}

impl From<EtagError> for SyncError {
    fn from(value: EtagError) -> Self {
        Self::invalid_argument(value.to_string())
    }
}

impl From<ArticleIdentifierError> for SyncError {
    fn from(value: ArticleIdentifierError) -> Self {
        Self::invalid_argument(value.to_string())
    }
}
