//! Inbound ports (driving side - API)

use crate::domain::{MiningOutcome, MiningStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Primary port: mining coordination
#[async_trait]
pub trait MiningService: Send + Sync {
    /// Subscribe to head changes and issue the first candidate
    async fn start(&self) -> Result<()>;

    /// Stop issuing candidates and accepting solutions. Idempotent.
    async fn shutdown(&self);

    /// Report that `randomness` solves candidate `candidate_id`
    async fn successfully_mined(&self, randomness: u64, candidate_id: u64) -> MiningOutcome;

    /// Current state and counters
    async fn status(&self) -> MiningStatus;
}
