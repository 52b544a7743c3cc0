//! Mempool error types.

use shared_types::TransactionId;
use thiserror::Error;

/// Mempool error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MempoolError {
    /// Transaction already exists in the pool.
    #[error("Transaction {0} already in pool")]
    DuplicateTransaction(TransactionId),

    /// Pool transactions must spend at least one note.
    #[error("Transaction {0} has no spends")]
    NoSpends(TransactionId),

    /// Reward transactions are created by the miner, never submitted.
    #[error("Transaction {0} is a miner's fee")]
    MinersFee(TransactionId),

    /// The nullifier ledger could not be read.
    #[error("Nullifier ledger error: {0}")]
    Ledger(String),
}

impl MempoolError {
    /// Whether the caller can retry later with the same input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Ledger(_))
    }
}
