//! Outbound ports (driven side - SPI)

use async_trait::async_trait;
use nc_01_mempool::NullifierLedger;
use nc_02_commitments::IncrementalMerkleTree;
use shared_types::{Block, BlockHeader, Hash};

use crate::error::ChainError;

/// Consistent view of the tip used to build one candidate
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    /// Header of the tip
    pub header: BlockHeader,
    /// Note tree as of the tip
    pub notes: IncrementalMerkleTree,
    /// Nullifier tree as of the tip
    pub nullifiers: IncrementalMerkleTree,
}

impl ChainSnapshot {
    pub fn head_hash(&self) -> Hash {
        self.header.hash()
    }

    /// Confirmed nullifiers visible at the tip
    pub fn nullifier_size(&self) -> u64 {
        self.nullifiers.size()
    }
}

/// Outcome of a dry-run block check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    pub valid: bool,
    pub reason: Option<String>,
}

impl VerifyResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Outcome of a block submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddBlockResult {
    pub is_added: bool,
    pub reason: Option<String>,
}

impl AddBlockResult {
    pub fn added() -> Self {
        Self {
            is_added: true,
            reason: None,
        }
    }

    pub fn not_added(reason: impl Into<String>) -> Self {
        Self {
            is_added: false,
            reason: Some(reason.into()),
        }
    }
}

/// The canonical chain
///
/// Owns confirmed state. The coordinator only reads through this port and
/// writes through `add_block`, which publishes `ChainHeadChanged` on success.
#[async_trait]
pub trait Chain: NullifierLedger {
    /// Hash of the current tip
    async fn head_hash(&self) -> Result<Hash, ChainError>;

    /// Header of the current tip
    async fn head_header(&self) -> Result<BlockHeader, ChainError>;

    /// Tip header and commitment trees read atomically
    async fn snapshot(&self) -> Result<ChainSnapshot, ChainError>;

    /// Check whether `block` could be appended without appending it
    async fn verify_block_add(&self, block: &Block) -> Result<VerifyResult, ChainError>;

    /// Append `block` if it extends the tip and is valid
    async fn add_block(&self, block: Block) -> Result<AddBlockResult, ChainError>;
}
