//! Domain layer for the mining coordinator

pub mod candidate;
pub mod difficulty;
pub mod entities;

pub use candidate::{CandidateBlock, RecentCandidates};
pub use difficulty::{DifficultyController, DifficultyState, HomesteadCurve, RetargetCurve};
pub use entities::{MiningOutcome, MiningState, MiningStatus, RejectionReason};
