//! Coordinator state and reconciliation outcomes.

use shared_types::{Hash, TransactionId, U256};
use std::fmt;

/// Lifecycle of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiningState {
    #[default]
    Stopped,
    Starting,
    Mining,
}

/// Point-in-time summary for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningStatus {
    pub state: MiningState,
    /// Head the active candidate extends
    pub head: Option<Hash>,
    pub active_candidate: Option<u64>,
    pub candidates_built: u64,
    pub blocks_mined: u64,
    /// Difficulty of the active candidate
    pub difficulty: Option<U256>,
    /// Identifies the current mining session in logs
    pub session_id: Option<String>,
}

/// Why a solution for a live candidate was thrown away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// A confirmed block spent one of the candidate's nullifiers
    InvalidTransaction(TransactionId),
    /// The chain refused the block during verification
    VerificationFailed(String),
    /// The chain verified the block but did not append it
    NotAdded(String),
    /// The chain could not be reached while reconciling
    Chain(String),
}

impl RejectionReason {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidTransaction(_) => "invalid_transaction",
            Self::VerificationFailed(_) => "verification_failed",
            Self::NotAdded(_) => "not_added",
            Self::Chain(_) => "chain_error",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransaction(id) => write!(f, "transaction {id} no longer valid"),
            Self::VerificationFailed(reason) => write!(f, "verification failed: {reason}"),
            Self::NotAdded(reason) => write!(f, "block not added: {reason}"),
            Self::Chain(reason) => write!(f, "chain error: {reason}"),
        }
    }
}

/// Result of reporting a solution.
///
/// Every variant except `Accepted` is a lost race, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningOutcome {
    /// The coordinator is stopped
    NotRunning,
    /// Id never issued or already evicted
    UnknownCandidate,
    /// The candidate's parent is no longer the head
    Stale,
    Rejected { reason: RejectionReason },
    Accepted { hash: Hash, sequence: u64 },
}

impl MiningOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Metric label for discarded solutions.
    pub fn discard_label(&self) -> Option<&'static str> {
        match self {
            Self::NotRunning => Some("not_running"),
            Self::UnknownCandidate => Some("unknown_candidate"),
            Self::Stale => Some("stale"),
            Self::Rejected { reason } => Some(reason.label()),
            Self::Accepted { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discard_labels() {
        assert_eq!(MiningOutcome::Stale.discard_label(), Some("stale"));
        assert_eq!(
            MiningOutcome::Rejected {
                reason: RejectionReason::NotAdded("fork".into())
            }
            .discard_label(),
            Some("not_added")
        );
        let accepted = MiningOutcome::Accepted {
            hash: [1; 32],
            sequence: 2,
        };
        assert!(accepted.is_accepted());
        assert_eq!(accepted.discard_label(), None);
    }

    #[test]
    fn test_default_state_is_stopped() {
        assert_eq!(MiningState::default(), MiningState::Stopped);
    }
}
