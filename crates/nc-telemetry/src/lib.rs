//! # NoteChain Telemetry
//!
//! Structured logging and Prometheus metrics for the mining core.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nc_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NC_SERVICE_NAME` | `notechain-mining` | Service name in the startup log |
//! | `NC_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honoured) |
//! | `NC_JSON_LOGS` | `false` | Emit JSON log records |
//! | `NC_SOURCE_LOCATIONS` | `false` | Include file and line numbers |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, BLOCKS_MINED, CANDIDATES_BUILT,
    CANDIDATE_BUILD_DURATION, HEAD_SEQUENCE, MEMPOOL_TRANSACTIONS, RETARGETS,
    SOLUTIONS_DISCARDED,
};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Register metrics and install the tracing subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_tracing(config)
}
