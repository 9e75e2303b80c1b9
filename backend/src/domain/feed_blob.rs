//! Feed blob versioning and the conditional-write protocol.
//!
//! Each chain owns at most one feed blob. Every successful write stores a new
//! server-generated [`Etag`], and writers state what they believe the current
//! version is through a [`Precondition`]. The decision logic here is pure:
//! storage adapters only execute the [`WriteStep`]s it asks for and report
//! how many rows each one touched, so both backends share one rule set.

use std::fmt;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::chain::UserDbId;

const WEAK_PREFIX: &str = "W/";
const WILDCARD: &str = "*";
const ETAG_DIGEST_BYTES: usize = 16;

/// Errors raised while parsing client-supplied entity tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EtagError {
    /// The header value was empty.
    #[error("entity tag must not be empty")]
    Empty,
}

/// Opaque version token for a feed blob, always stored in weak form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Etag(String);

impl Etag {
    /// Generate the tag for a new write.
    ///
    /// A random nonce is mixed in, so writing identical content twice still
    /// produces two distinct tags.
    pub fn generate(content_hash: i64, content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content_hash.to_be_bytes());
        hasher.update(content.as_bytes());
        hasher.update(Uuid::new_v4().as_bytes());
        let digest = hasher.finalize();
        let short = digest.get(..ETAG_DIGEST_BYTES).unwrap_or(digest.as_slice());
        Self(format!("{WEAK_PREFIX}\"{}\"", hex::encode(short)))
    }

    /// Normalize a client-supplied tag into stored form.
    ///
    /// Strong and weak forms of the same opaque value compare equal, and an
    /// unquoted value is quoted.
    ///
    /// # Examples
    /// ```
    /// use chainsync::domain::Etag;
    ///
    /// let strong = Etag::parse("\"abc\"").expect("valid");
    /// let weak = Etag::parse("W/\"abc\"").expect("valid");
    /// assert_eq!(strong, weak);
    /// assert_eq!(weak.as_str(), "W/\"abc\"");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, EtagError> {
        let trimmed = raw.trim();
        let opaque = trimmed.strip_prefix(WEAK_PREFIX).unwrap_or(trimmed);
        if opaque.is_empty() || opaque == "\"\"" {
            return Err(EtagError::Empty);
        }
        let quoted = opaque.len() >= 2 && opaque.starts_with('"') && opaque.ends_with('"');
        if quoted {
            Ok(Self(format!("{WEAK_PREFIX}{opaque}")))
        } else {
            Ok(Self(format!("{WEAK_PREFIX}\"{opaque}\"")))
        }
    }

    /// Rehydrate a tag read back from storage without re-validating it.
    pub fn from_storage(value: String) -> Self {
        Self(value)
    }

    /// Borrow the stored form, suitable for an `ETag` response header.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Weak comparison: the `W/` prefix is ignored on both sides.
    pub fn matches(&self, other: &Self) -> bool {
        self.opaque() == other.opaque()
    }

    fn opaque(&self) -> &str {
        self.0.strip_prefix(WEAK_PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The single mutable blob owned by a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedBlob {
    pub owner: UserDbId,
    pub content_hash: i64,
    pub content: String,
    pub etag: Etag,
}

/// What a writer believes about the current version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Unconditional write: create or overwrite.
    Any,
    /// Overwrite only if the current tag matches; absence counts as a match.
    IfMatch(Etag),
    /// Overwrite whatever is present; fail if nothing is.
    IfMatchAny,
    /// The writer has never read the blob; only creation is allowed.
    NoPrecondition,
}

impl Precondition {
    /// Map an `If-Match` header onto the precondition vocabulary.
    ///
    /// A missing header means the client sent no precondition, and `*`
    /// matches any present version.
    ///
    /// # Examples
    /// ```
    /// use chainsync::domain::Precondition;
    ///
    /// assert_eq!(Precondition::from_if_match(None), Ok(Precondition::NoPrecondition));
    /// assert_eq!(Precondition::from_if_match(Some("*")), Ok(Precondition::IfMatchAny));
    /// ```
    pub fn from_if_match(header: Option<&str>) -> Result<Self, EtagError> {
        match header.map(str::trim) {
            None => Ok(Self::NoPrecondition),
            Some(WILDCARD) => Ok(Self::IfMatchAny),
            Some(value) => Etag::parse(value).map(Self::IfMatch),
        }
    }

    /// First storage step to attempt for this precondition.
    pub fn first_step(&self) -> WriteStep {
        match self {
            Self::Any => WriteStep::Upsert,
            Self::IfMatch(expected) => WriteStep::ReplaceMatching(expected.clone()),
            Self::IfMatchAny => WriteStep::ReplaceExisting,
            Self::NoPrecondition => WriteStep::Insert,
        }
    }
}

/// One compare-and-swap statement executed by a storage adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStep {
    /// Insert, or overwrite on owner conflict.
    Upsert,
    /// Insert; an existing row is reported as [`StepOutcome::OwnerExists`].
    Insert,
    /// Overwrite the existing row, whatever its tag.
    ReplaceExisting,
    /// Overwrite the existing row only if its tag equals this one.
    ReplaceMatching(Etag),
}

/// What a [`WriteStep`] did to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The row was written.
    Applied,
    /// An update matched no row.
    NothingMatched,
    /// An insert collided with the chain's existing row.
    OwnerExists,
}

/// Next move after a step completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteDecision {
    /// The write is durable; report the new tag.
    Committed,
    /// Run another step.
    Then(WriteStep),
    /// The precondition does not hold.
    Rejected,
}

impl WriteStep {
    /// Decide what follows this step given its outcome.
    ///
    /// A tag mismatch on [`WriteStep::ReplaceMatching`] may mean the row does
    /// not exist yet, so it falls back to an insert; that insert colliding
    /// proves a row with a different tag is present.
    pub fn decide(&self, outcome: StepOutcome) -> WriteDecision {
        match (self, outcome) {
            (_, StepOutcome::Applied) => WriteDecision::Committed,
            (Self::ReplaceMatching(_), StepOutcome::NothingMatched) => {
                WriteDecision::Then(Self::Insert)
            }
            _ => WriteDecision::Rejected,
        }
    }
}

/// Parsed `If-None-Match` header for conditional reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfNoneMatch {
    /// No header was sent.
    Absent,
    /// The wildcard; never produces "not modified" for reads.
    Any,
    /// A specific cached version.
    Etag(Etag),
}

impl IfNoneMatch {
    /// Map an `If-None-Match` header.
    pub fn from_header(header: Option<&str>) -> Result<Self, EtagError> {
        match header.map(str::trim) {
            None => Ok(Self::Absent),
            Some(WILDCARD) => Ok(Self::Any),
            Some(value) => Etag::parse(value).map(Self::Etag),
        }
    }
}

/// Result of a cache-revalidating read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalRead {
    /// The caller's copy is current.
    NotModified,
    /// The caller's copy is stale or absent; here is the current state.
    Modified(FeedBlob),
}

impl ConditionalRead {
    /// Compare the stored blob with the caller's cached version.
    pub fn evaluate(current: FeedBlob, condition: &IfNoneMatch) -> Self {
        match condition {
            IfNoneMatch::Etag(cached) if cached.matches(&current.etag) => Self::NotModified,
            _ => Self::Modified(current),
        }
    }
}
