//! # Transaction Pool
//!
//! Holds unconfirmed transactions for block assembly and enforces spend
//! uniqueness against the confirmed nullifier ledger and against the other
//! transactions chosen for the same block.
//!
//! ## Architecture
//!
//! ```text
//! submission ──accept_transaction──► ┌─────────────────┐
//!                                    │ TransactionPool │ ◄── ConfirmedBlockSubscriber
//! coordinator ──select_for_block───► │  (insertion     │       (ChainHeadChanged)
//!                                    │   ordered)      │
//!                                    └────────┬────────┘
//!                                             │ contains_nullifier
//!                                             ▼
//!                                     NullifierLedger (chain)
//! ```
//!
//! ## Invariants
//!
//! - Iteration order is admission order; selection is deterministic.
//! - First-seen wins: within one selection pass, the earliest transaction
//!   spending a nullifier is kept and every later claimant is rejected.
//! - Transactions rejected during selection stay in the pool; entries leave
//!   only on confirmation or explicit eviction.

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::ConfirmedBlockSubscriber;
pub use domain::{
    BlockLimits, MempoolConfig, MempoolError, PoolEntry, SeenNullifiers, Selection,
    TransactionPool,
};
pub use ports::{MockTimeSource, NullifierLedger, SystemTimeSource, TimeSource};
