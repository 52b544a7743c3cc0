//! Pool configuration.

use serde::{Deserialize, Serialize};

/// Default maximum number of pooled transactions.
pub const DEFAULT_MAX_TRANSACTIONS: usize = 10_000;

/// Mempool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Capacity; the oldest entry is evicted to admit a new one when full.
    pub max_transactions: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: DEFAULT_MAX_TRANSACTIONS,
        }
    }
}
