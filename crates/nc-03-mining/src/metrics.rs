//! Per-coordinator counters, mirrored into the process-wide Prometheus
//! registry.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for one coordinator
#[derive(Debug, Default)]
pub struct Metrics {
    /// Candidates handed to miners
    pub candidates_built: AtomicU64,

    /// Candidates rebuilt by the retarget timer
    pub retargets: AtomicU64,

    /// Solutions accepted by the chain
    pub blocks_mined: AtomicU64,

    /// Solutions dropped before or at the chain
    pub solutions_discarded: AtomicU64,

    /// Pool transactions included across built candidates
    pub transactions_included: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly published candidate
    pub fn record_candidate(&self, tx_count: usize, sequence: u64) {
        self.candidates_built.fetch_add(1, Ordering::Relaxed);
        self.transactions_included
            .fetch_add(tx_count as u64, Ordering::Relaxed);
        nc_telemetry::CANDIDATES_BUILT.inc();
        nc_telemetry::HEAD_SEQUENCE.set(sequence.saturating_sub(1) as i64);
    }

    pub fn record_retarget(&self) {
        self.retargets.fetch_add(1, Ordering::Relaxed);
        nc_telemetry::RETARGETS.inc();
    }

    pub fn record_block_mined(&self, sequence: u64) {
        self.blocks_mined.fetch_add(1, Ordering::Relaxed);
        nc_telemetry::BLOCKS_MINED.inc();
        nc_telemetry::HEAD_SEQUENCE.set(sequence as i64);
    }

    /// Record a dropped solution under `reason`
    pub fn record_discarded(&self, reason: &str) {
        self.solutions_discarded.fetch_add(1, Ordering::Relaxed);
        nc_telemetry::SOLUTIONS_DISCARDED
            .with_label_values(&[reason])
            .inc();
    }

    pub fn get_candidates_built(&self) -> u64 {
        self.candidates_built.load(Ordering::Relaxed)
    }

    pub fn get_retargets(&self) -> u64 {
        self.retargets.load(Ordering::Relaxed)
    }

    pub fn get_blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    pub fn get_solutions_discarded(&self) -> u64 {
        self.solutions_discarded.load(Ordering::Relaxed)
    }

    /// Average pool transactions per candidate
    pub fn get_avg_transactions_per_candidate(&self) -> f64 {
        let candidates = self.candidates_built.load(Ordering::Relaxed);
        if candidates == 0 {
            return 0.0;
        }
        let txs = self.transactions_included.load(Ordering::Relaxed);
        txs as f64 / candidates as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_candidate(4, 2);
        metrics.record_candidate(2, 2);
        metrics.record_retarget();
        metrics.record_block_mined(2);
        metrics.record_discarded("stale");

        assert_eq!(metrics.get_candidates_built(), 2);
        assert_eq!(metrics.get_retargets(), 1);
        assert_eq!(metrics.get_blocks_mined(), 1);
        assert_eq!(metrics.get_solutions_discarded(), 1);
        assert_eq!(metrics.get_avg_transactions_per_candidate(), 3.0);
    }

    #[test]
    fn test_empty_average() {
        assert_eq!(Metrics::new().get_avg_transactions_per_candidate(), 0.0);
    }
}
