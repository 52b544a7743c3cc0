//! Difficulty retargeting
//!
//! **IMPORTANT**: the PoW target is a CEILING:
//! - HIGHER target number = EASIER
//! - LOWER target number = HARDER
//!
//! Difficulty is `U256::MAX / target`, so raising difficulty lowers the target.
//!
//! The curve deciding how difficulty moves with block time is network policy
//! and is injected through [`RetargetCurve`]. The controller only guarantees
//! the floor: no target is ever produced below `min_difficulty`.

use shared_types::{BlockHeader, Hash, Target, U256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Strategy computing the next difficulty from the parent's.
pub trait RetargetCurve: Send + Sync + fmt::Debug {
    /// Difficulty for a block mined `elapsed` after its parent.
    ///
    /// Must be non-increasing in `elapsed` beyond some threshold. The caller
    /// applies the minimum-difficulty floor.
    fn next_difficulty(&self, previous: U256, elapsed: Duration) -> U256;
}

/// Bucketed adjustment in the style of Ethereum's Homestead rule
///
/// Blocks found within the first bucket raise difficulty by `prev / 2048`.
/// The second bucket leaves it unchanged. Each bucket after that lowers it
/// by one more `prev / 2048` step, capped at 99 steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomesteadCurve {
    bucket_secs: u64,
}

/// Largest downward step count per block.
const MAX_DOWNWARD_STEPS: i64 = 99;

/// Adjustment step divisor.
const STEP_DIVISOR: u64 = 2048;

impl HomesteadCurve {
    pub fn new(bucket_secs: u64) -> Self {
        Self {
            bucket_secs: bucket_secs.max(1),
        }
    }
}

impl Default for HomesteadCurve {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_DIFFICULTY_BUCKET_SECS)
    }
}

impl RetargetCurve for HomesteadCurve {
    fn next_difficulty(&self, previous: U256, elapsed: Duration) -> U256 {
        let bucket = (elapsed.as_secs() / self.bucket_secs).min(i64::MAX as u64) as i64;
        let factor = (1 - bucket).max(-MAX_DOWNWARD_STEPS);
        let step = previous / U256::from(STEP_DIVISOR);

        if factor >= 0 {
            previous.saturating_add(step.saturating_mul(U256::from(factor as u64)))
        } else {
            previous.saturating_sub(step.saturating_mul(U256::from(factor.unsigned_abs())))
        }
    }
}

/// Difficulty and target chosen for the active head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyState {
    pub difficulty: U256,
    pub target: Target,
    /// Candidate timestamp the values were computed for
    pub last_checked_ms: u64,
}

/// Computes targets and decides when a candidate is worth refreshing
#[derive(Debug, Clone)]
pub struct DifficultyController {
    min_difficulty: U256,
    retarget_interval: Duration,
    curve: Arc<dyn RetargetCurve>,
}

impl DifficultyController {
    /// Create a controller. A `min_difficulty` below 1 is raised to 1.
    pub fn new(
        min_difficulty: U256,
        retarget_interval: Duration,
        curve: Arc<dyn RetargetCurve>,
    ) -> Self {
        Self {
            min_difficulty: min_difficulty.max(U256::one()),
            retarget_interval,
            curve,
        }
    }

    /// Network floor.
    pub fn min_difficulty(&self) -> U256 {
        self.min_difficulty
    }

    /// Easiest target the network accepts.
    pub fn min_target(&self) -> Target {
        Target::from_difficulty(self.min_difficulty)
    }

    pub fn retarget_interval(&self) -> Duration {
        self.retarget_interval
    }

    /// Difficulty and target for a child of `previous` stamped `elapsed`
    /// after it.
    pub fn calculate_target(&self, previous: &BlockHeader, elapsed: Duration) -> (U256, Target) {
        let previous_difficulty = previous.target.difficulty();
        let next = self
            .curve
            .next_difficulty(previous_difficulty, elapsed)
            .max(self.min_difficulty);
        (next, Target::from_difficulty(next))
    }

    /// True iff `hash` satisfies `target`.
    pub fn meets(&self, hash: &Hash, target: &Target) -> bool {
        target.meets(hash)
    }

    /// A refresh can only lower difficulty, which is pointless at the floor.
    pub fn should_schedule_retarget(&self, difficulty: U256) -> bool {
        difficulty > self.min_difficulty
    }

    /// Compute the state for a candidate timestamped `timestamp_ms`.
    pub fn state_for(&self, previous: &BlockHeader, timestamp_ms: u64) -> DifficultyState {
        let elapsed =
            Duration::from_millis(timestamp_ms.saturating_sub(previous.timestamp_ms));
        let (difficulty, target) = self.calculate_target(previous, elapsed);
        DifficultyState {
            difficulty,
            target,
            last_checked_ms: timestamp_ms,
        }
    }
}
