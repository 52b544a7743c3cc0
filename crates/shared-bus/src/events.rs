//! # Blockchain Events
//!
//! Defines all event types that flow through the shared bus.

use serde::{Deserialize, Serialize};
use shared_types::entities::{Block, BlockHeader, Target, TransactionId};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BlockchainEvent {
    // =========================================================================
    // CHAIN
    // =========================================================================
    /// The canonical chain tip moved.
    ///
    /// Carries the ids of the transactions confirmed by the new head so the
    /// mempool can drop them.
    ChainHeadChanged {
        /// Header of the new head.
        header: BlockHeader,
        /// Transactions included in the new head block.
        transaction_ids: Vec<TransactionId>,
    },

    // =========================================================================
    // MINING
    // =========================================================================
    /// A new block template is available for external miners.
    CandidateReady {
        /// Id to quote back in `successfully_mined`.
        candidate_id: u64,
        /// Encoded header with randomness zeroed.
        header_bytes: Vec<u8>,
        /// Proof-of-work target the miner must meet.
        target: Target,
        /// Sequence of the candidate block.
        sequence: u64,
    },

    /// A locally mined block was accepted by the chain.
    NewBlockMined(Block),

    // =========================================================================
    // MEMPOOL
    // =========================================================================
    /// A transaction entered the pool.
    TransactionAccepted(TransactionId),
}

impl BlockchainEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ChainHeadChanged { .. } => EventTopic::Chain,
            Self::CandidateReady { .. } | Self::NewBlockMined(_) => EventTopic::Mining,
            Self::TransactionAccepted(_) => EventTopic::Mempool,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Chain head updates.
    Chain,
    /// Candidate templates and mined blocks.
    Mining,
    /// Transaction pool activity.
    Mempool,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &BlockchainEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
