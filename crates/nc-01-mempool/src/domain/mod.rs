//! Domain layer for the transaction pool.

pub mod config;
pub mod errors;
pub mod pool;
pub mod selection;

pub use config::MempoolConfig;
pub use errors::MempoolError;
pub use pool::{PoolEntry, TransactionPool};
pub use selection::{BlockLimits, SeenNullifiers, Selection};
