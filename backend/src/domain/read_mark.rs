//! Read marks: the append-only set of article identifiers a chain has read.

use std::fmt;

use chrono::{DateTime, Utc};

use super::chain::UserDbId;

/// Maximum number of read marks returned by one "updated since" listing.
pub const READ_MARK_PAGE_LIMIT: i64 = 1000;

/// Client-chosen opaque article identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArticleIdentifier(String);

/// Validation errors for [`ArticleIdentifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArticleIdentifierError {
    /// The identifier was empty or whitespace.
    #[error("article identifier must not be empty")]
    Empty,
}

impl ArticleIdentifier {
    /// Validate a client-supplied identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, ArticleIdentifierError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ArticleIdentifierError::Empty);
        }
        Ok(Self(value))
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ArticleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One read mark owned by a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadMark {
    pub owner: UserDbId,
    pub identifier: ArticleIdentifier,
    pub read_time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of adding a read mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMarkInsert {
    /// A new row was stored.
    Inserted,
    /// The chain already had this identifier; nothing changed.
    AlreadyPresent,
}
