//! # NoteChain Mining Coordinator
//!
//! **Bounded Context:** Candidate assembly, difficulty retargeting and
//! solution reconciliation
//!
//! ## Purpose
//!
//! Turns the chain head and the transaction pool into block candidates for
//! external miners, and turns their solutions back into chain blocks:
//! - Rebuilds the candidate on every head change
//! - Refreshes the candidate on an unchanged head while difficulty is above
//!   the network floor
//! - Matches late solutions to the exact header they were issued for
//! - Re-checks every spend before submitting a solved block
//!
//! ## Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Adapters (Outer)                                   │
//! │  - InMemoryChain: single-branch chain for tests     │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Ports (Middle)                                     │
//! │  - Inbound: MiningService                           │
//! │  - Outbound: Chain (+ NullifierLedger)              │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (Inner - Pure Logic)                        │
//! │  - DifficultyController / RetargetCurve             │
//! │  - CandidateBlock / RecentCandidates                │
//! │  - MiningOutcome                                    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Session Flow
//!
//! ```text
//! ChainHeadChanged ──► owner task ──► construct_and_mine_block ──► CandidateReady
//!        ▲                  ▲                                           │
//!        │            retarget timer                               external miner
//!        │                                                              │
//!   Chain::add_block ◄──── successfully_mined(randomness, id) ◄─────────┘
//! ```
//!
//! ## Invariants
//!
//! 1. **Serial Construction**: only the session's owner task builds candidates
//! 2. **Timer Hygiene**: a head change cancels the pending retarget before the
//!    next candidate is built; at minimum difficulty no timer is scheduled
//! 3. **No Resurrection**: candidates for a superseded head are evicted and
//!    their solutions report `UnknownCandidate`
//! 4. **Races Are Not Errors**: stale or rejected solutions are outcomes
//! 5. **Timestamp Monotonicity**: `timestamp = max(now, parent + 1)`
//! 6. **Quiet Shutdown**: after `shutdown` returns nothing is built or
//!    submitted

#![warn(clippy::all)]

/// Chain adapters
pub mod adapters;
/// Domain models and business logic
pub mod domain;
/// Hexagonal ports
pub mod ports;
/// The coordinator
pub mod service;

/// Configuration loading
pub mod config;
mod error;
mod metrics;

pub use config::{ConfigError, MiningConfig};
pub use error::{ChainError, MiningError, Result};
pub use metrics::Metrics;

pub use domain::{
    CandidateBlock, DifficultyController, DifficultyState, HomesteadCurve, MiningOutcome,
    MiningState, MiningStatus, RecentCandidates, RejectionReason, RetargetCurve,
};

pub use ports::{AddBlockResult, Chain, ChainSnapshot, MiningService, VerifyResult};

pub use adapters::InMemoryChain;

pub use service::MiningCoordinator;
