//! Commitment tree errors.

use thiserror::Error;

/// Errors raised while appending to commitment trees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitmentError {
    /// Every leaf slot of the tree is in use.
    #[error("Merkle tree of depth {depth} is full ({capacity} leaves)")]
    TreeFull { depth: u8, capacity: u64 },

    /// Requested depth is outside the supported range.
    #[error("Unsupported tree depth {0} (expected 1..=63)")]
    InvalidDepth(u8),
}
