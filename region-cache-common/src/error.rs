//! # Error Taxonomy
//!
//! One enum per error *kind* from the spec's propagation table, not one
//! variant per call site. Callers match on kind, not on message text.

use std::fmt;

/// Result alias used throughout the engine.
pub type RegionResult<T> = Result<T, RegionError>;

/// Every error the region entry engine can surface to a caller.
///
/// Variants map 1:1 onto the error taxonomy: argument validation, region
/// state, version-stamp conflicts, delta application, entry presence,
/// tracker races, writer vetoes, listener/loader failures, persistence
/// failures, and opaque remote statuses.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    /// Null/empty key, invalid duration, or an out-of-range enum value.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Operation attempted on a closed region, a double-started expiry
    /// manager, or an attributes-mutator change gated on a disabled feature.
    #[error("invalid state: {0}")]
    State(String),

    /// A version tag was rejected by the conflict-resolution algorithm
    /// because a higher-versioned write already applied.
    #[error("concurrent modification")]
    ConcurrentModification,

    /// A delta could not be applied: the tag was not exactly one ahead of
    /// the stored stamp, the previous-member-id did not match, or the delta
    /// object itself failed to apply.
    #[error("invalid delta")]
    InvalidDelta,

    /// `create` was called against a key that already holds a live value.
    #[error("entry exists")]
    EntryExists,

    /// `remove`/`invalidate` was called against an absent or tombstoned key.
    #[error("entry not found")]
    EntryNotFound,

    /// A tracked entry's update counter moved between the tracker snapshot
    /// and the local apply; the caller's derived value must be abandoned.
    #[error("entry updated during tracked operation")]
    EntryUpdated,

    /// A `CacheWriter` rejected a non-notification/eviction/expiration event.
    #[error("writer veto")]
    WriterVeto,

    /// A `CacheListener` callback panicked or returned an error; the data
    /// change that triggered it still stands.
    #[error("listener failure: {0}")]
    ListenerFailure(String),

    /// A `CacheLoader` callback failed while servicing a `get` miss.
    #[error("loader failure: {0}")]
    LoaderFailure(String),

    /// The persistence manager failed a read/write/destroy call.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// An opaque status returned by the `RemoteOp` collaborator.
    #[error("remote operation failed: {0}")]
    Remote(RemoteStatus),
}

impl RegionError {
    /// Convenience constructor for argument errors.
    pub fn argument(msg: impl Into<String>) -> Self {
        RegionError::Argument(msg.into())
    }

    /// Convenience constructor for state errors.
    pub fn state(msg: impl Into<String>) -> Self {
        RegionError::State(msg.into())
    }
}

/// Status codes a `RemoteOp` collaborator may return, per spec §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    NotAuthorized,
    TimedOut,
    TransactionDataRebalanced,
    TransactionDataNodeDeparted,
    InvalidDelta,
    Other(String),
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteStatus::NotAuthorized => write!(f, "not authorized"),
            RemoteStatus::TimedOut => write!(f, "timed out"),
            RemoteStatus::TransactionDataRebalanced => write!(f, "transaction data rebalanced"),
            RemoteStatus::TransactionDataNodeDeparted => {
                write!(f, "transaction data node departed")
            }
            RemoteStatus::InvalidDelta => write!(f, "invalid delta"),
            RemoteStatus::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl RemoteStatus {
    /// True for the two statuses that require transaction replay before
    /// returning to the caller (spec §4.9, §7).
    pub fn requires_transaction_replay(&self) -> bool {
        matches!(
            self,
            RemoteStatus::TransactionDataRebalanced | RemoteStatus::TransactionDataNodeDeparted
        )
    }
}
