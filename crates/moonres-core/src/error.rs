//! Error types for the storage engine.

use thiserror::Error;

/// Errors returned by store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The operation targets a key holding a value of the wrong type,
    /// e.g. GET against a hash key.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// The requested shard count is not a power of two in [1, 64].
    #[error("invalid shard count {0}: must be a power of two between 1 and 64")]
    InvalidShardCount(usize),
}
