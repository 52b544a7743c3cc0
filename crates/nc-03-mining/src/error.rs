//! Error types for the mining coordinator

use nc_01_mempool::MempoolError;
use nc_02_commitments::CommitmentError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for mining operations
pub type Result<T> = std::result::Result<T, MiningError>;

/// Failures reported by the chain port
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The chain cannot be queried right now
    #[error("Chain unavailable: {0}")]
    Unavailable(String),

    /// The chain's backing store failed
    #[error("Chain storage error: {0}")]
    Storage(String),
}

impl From<ChainError> for MempoolError {
    fn from(err: ChainError) -> Self {
        MempoolError::Ledger(err.to_string())
    }
}

/// Errors that can occur while coordinating mining
#[derive(Debug, Error)]
pub enum MiningError {
    /// No reward account configured and mining was not forced
    #[error("No miner account configured")]
    MissingMinerAccount,

    /// The chain head could not be read at start
    #[error("Chain unavailable: {0}")]
    ChainUnavailable(String),

    /// `start` called on a running coordinator
    #[error("Mining already running")]
    AlreadyRunning,

    /// Chain port failure
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Transaction pool failure
    #[error("Mempool error: {0}")]
    Mempool(#[from] MempoolError),

    /// Commitment tree failure
    #[error("Commitment error: {0}")]
    Commitment(#[from] CommitmentError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl MiningError {
    /// Check if error is recoverable (the next head change may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Chain(_) | Self::ChainUnavailable(_) => true,
            Self::Mempool(err) => err.is_recoverable(),
            _ => false,
        }
    }

    /// Check if error is critical (mining cannot continue)
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::MissingMinerAccount | Self::Config(_) | Self::Commitment(_)
        )
    }
}
