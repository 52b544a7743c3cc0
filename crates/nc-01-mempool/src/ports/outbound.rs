//! Outbound (Driven) ports for the transaction pool.
//!
//! These traits define dependencies on external systems that the pool
//! needs for operation.

use async_trait::async_trait;
use shared_types::Nullifier;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::MempoolError;

/// Point-in-time view of the confirmed spend set.
///
/// Implemented by the chain. Every double-spend check against history reads
/// through this port; the pool keeps no copy of the ledger.
#[async_trait]
pub trait NullifierLedger: Send + Sync {
    /// Number of nullifiers confirmed up to and including block `at_sequence`.
    async fn nullifier_history_size(&self, at_sequence: u64) -> Result<u64, MempoolError>;

    /// Nullifier at `position` in confirmation order, if any.
    async fn nullifier_at(&self, position: u64) -> Result<Option<Nullifier>, MempoolError>;

    /// Whether `nullifier` occupies any of the first `up_to_size` positions.
    async fn contains_nullifier(
        &self,
        nullifier: &Nullifier,
        up_to_size: u64,
    ) -> Result<bool, MempoolError>;
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current time in milliseconds since the UNIX epoch.
    fn now_ms(&self) -> u64;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct MockTimeSource {
    time: AtomicU64,
}

impl MockTimeSource {
    pub fn new(initial_ms: u64) -> Self {
        Self {
            time: AtomicU64::new(initial_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.time.store(ms, Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now_ms(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_time_source() {
        let time = MockTimeSource::new(1_000);
        assert_eq!(time.now_ms(), 1_000);

        time.advance(500);
        assert_eq!(time.now_ms(), 1_500);

        time.set(42);
        assert_eq!(time.now_ms(), 42);
    }

    #[test]
    fn test_system_time_source_is_after_2020() {
        assert!(SystemTimeSource.now_ms() > 1_577_836_800_000);
    }
}
