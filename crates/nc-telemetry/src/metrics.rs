//! Prometheus metrics for the mining core.
//!
//! All metrics follow the naming convention: `nc_<component>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // MINING METRICS
    // =========================================================================

    /// Candidates published to miners (new heads and retargets)
    pub static ref CANDIDATES_BUILT: IntCounter = IntCounter::new(
        "nc_mining_candidates_built_total",
        "Total block candidates published to miners"
    ).expect("metric creation failed");

    /// Candidates rebuilt because the retarget timer fired
    pub static ref RETARGETS: IntCounter = IntCounter::new(
        "nc_mining_retargets_total",
        "Total candidates rebuilt by the retarget timer"
    ).expect("metric creation failed");

    /// Locally mined blocks accepted by the chain
    pub static ref BLOCKS_MINED: IntCounter = IntCounter::new(
        "nc_mining_blocks_mined_total",
        "Total locally mined blocks added to the chain"
    ).expect("metric creation failed");

    /// Miner solutions that did not produce a block
    pub static ref SOLUTIONS_DISCARDED: IntCounterVec = IntCounterVec::new(
        Opts::new("nc_mining_solutions_discarded_total", "Discarded miner solutions by reason"),
        &["reason"]  // reason: unknown/stale/invalid_tx/rejected
    ).expect("metric creation failed");

    /// Sequence of the head the coordinator is mining on
    pub static ref HEAD_SEQUENCE: IntGauge = IntGauge::new(
        "nc_mining_head_sequence",
        "Sequence of the chain head currently being mined on"
    ).expect("metric creation failed");

    /// Time spent assembling a candidate
    pub static ref CANDIDATE_BUILD_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "nc_mining_candidate_build_duration_seconds",
            "Time spent selecting transactions and building a candidate"
        ).buckets(exponential_buckets(0.0001, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // MEMPOOL METRICS
    // =========================================================================

    /// Current pool size
    pub static ref MEMPOOL_TRANSACTIONS: IntGauge = IntGauge::new(
        "nc_mempool_transactions",
        "Number of transactions waiting in the pool"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already-registered collectors are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Mining
        Box::new(CANDIDATES_BUILT.clone()),
        Box::new(RETARGETS.clone()),
        Box::new(BLOCKS_MINED.clone()),
        Box::new(SOLUTIONS_DISCARDED.clone()),
        Box::new(HEAD_SEQUENCE.clone()),
        Box::new(CANDIDATE_BUILD_DURATION.clone()),
        // Mempool
        Box::new(MEMPOOL_TRANSACTIONS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
