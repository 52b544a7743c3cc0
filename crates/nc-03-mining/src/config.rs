//! Configuration types for the mining coordinator

use nc_01_mempool::{BlockLimits, MempoolConfig};
use serde::Deserialize;
use shared_types::{MinerAccount, U256};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default seconds between retarget checks on an unchanged head.
pub const DEFAULT_RETARGET_INTERVAL_SECS: u64 = 10;

/// Default width of one retarget bucket in seconds.
pub const DEFAULT_DIFFICULTY_BUCKET_SECS: u64 = 10;

/// Default network difficulty floor.
pub const DEFAULT_MIN_DIFFICULTY: u64 = 131_072;

/// Default number of candidates kept for solution matching.
pub const DEFAULT_RECENT_CANDIDATES: usize = 16;

/// Errors raised while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Runtime configuration for the mining coordinator
///
/// # Config File Format
///
/// ```toml
/// force_mining = false
/// include_miners_fee = true
/// block_reward = 2000000000
/// graffiti = "notechain"
/// retarget_interval_secs = 10
/// min_difficulty = 131072
///
/// [miner_account]
/// public_address = "ab..ab"   # 32 bytes hex
/// view_key = "cd..cd"
///
/// [mempool]
/// max_transactions = 10000
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Reward recipient; required unless `force_mining` is set
    pub miner_account: Option<MinerAccount>,

    /// Mine even when the normal preconditions are not met
    pub force_mining: bool,

    /// Append the reward transaction to every candidate
    pub include_miners_fee: bool,

    /// Base block reward paid in the miner's fee
    pub block_reward: u64,

    /// Miner tag, at most 32 bytes
    pub graffiti: String,

    /// Seconds before a candidate on an unchanged head is refreshed
    pub retarget_interval_secs: u64,

    /// Network difficulty floor
    pub min_difficulty: u64,

    /// Width of one retarget bucket in seconds
    pub difficulty_bucket_secs: u64,

    /// Candidates kept for matching late solutions
    pub recent_candidates_capacity: usize,

    /// Maximum pool transactions per candidate
    pub max_block_transactions: usize,

    /// Maximum total transaction bytes per candidate
    pub max_block_bytes: usize,

    /// Transaction pool settings
    pub mempool: MempoolConfig,
}

impl Default for MiningConfig {
    fn default() -> Self {
        let limits = BlockLimits::default();
        Self {
            miner_account: None,
            force_mining: false,
            include_miners_fee: true,
            block_reward: 2_000_000_000,
            graffiti: String::new(),
            retarget_interval_secs: DEFAULT_RETARGET_INTERVAL_SECS,
            min_difficulty: DEFAULT_MIN_DIFFICULTY,
            difficulty_bucket_secs: DEFAULT_DIFFICULTY_BUCKET_SECS,
            recent_candidates_capacity: DEFAULT_RECENT_CANDIDATES,
            max_block_transactions: limits.max_transactions,
            max_block_bytes: limits.max_bytes,
            mempool: MempoolConfig::default(),
        }
    }
}

impl MiningConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retarget_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "retarget_interval_secs must be positive".into(),
            ));
        }
        if self.difficulty_bucket_secs == 0 {
            return Err(ConfigError::Invalid(
                "difficulty_bucket_secs must be positive".into(),
            ));
        }
        if self.min_difficulty == 0 {
            return Err(ConfigError::Invalid("min_difficulty must be at least 1".into()));
        }
        if self.recent_candidates_capacity == 0 {
            return Err(ConfigError::Invalid(
                "recent_candidates_capacity must be positive".into(),
            ));
        }
        if self.max_block_transactions == 0 || self.max_block_bytes == 0 {
            return Err(ConfigError::Invalid("block limits must be positive".into()));
        }
        if self.mempool.max_transactions == 0 {
            return Err(ConfigError::Invalid(
                "mempool.max_transactions must be positive".into(),
            ));
        }
        if self.graffiti.len() > 32 {
            return Err(ConfigError::Invalid(format!(
                "graffiti is {} bytes, limit is 32",
                self.graffiti.len()
            )));
        }
        Ok(())
    }

    pub fn retarget_interval(&self) -> Duration {
        Duration::from_secs(self.retarget_interval_secs)
    }

    pub fn min_difficulty(&self) -> U256 {
        U256::from(self.min_difficulty)
    }

    pub fn block_limits(&self) -> BlockLimits {
        BlockLimits {
            max_transactions: self.max_block_transactions,
            max_bytes: self.max_block_bytes,
        }
    }

    /// Graffiti right-padded with zeros.
    pub fn graffiti_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        let len = self.graffiti.len().min(32);
        bytes[..len].copy_from_slice(&self.graffiti.as_bytes()[..len]);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MiningConfig::default();
        assert!(config.miner_account.is_none());
        assert!(config.include_miners_fee);
        assert_eq!(config.retarget_interval(), Duration::from_secs(10));
        assert_eq!(config.recent_candidates_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = format!(
            r#"
            force_mining = true
            include_miners_fee = false
            graffiti = "pool-7"
            retarget_interval_secs = 5
            min_difficulty = 1

            [miner_account]
            public_address = "{}"
            view_key = "{}"

            [mempool]
            max_transactions = 64
            "#,
            "ab".repeat(32),
            "cd".repeat(32)
        );

        let config = MiningConfig::parse(&toml).unwrap();
        assert!(config.force_mining);
        assert!(!config.include_miners_fee);
        assert_eq!(config.retarget_interval_secs, 5);
        assert_eq!(config.min_difficulty(), U256::one());
        assert_eq!(config.mempool.max_transactions, 64);
        assert_eq!(
            config.miner_account.as_ref().unwrap().public_address,
            [0xAB; 32]
        );
        assert_eq!(&config.graffiti_bytes()[..6], b"pool-7");
        assert_eq!(config.graffiti_bytes()[6..], [0u8; 26]);
    }

    #[test]
    fn test_parse_rejects_zero_interval() {
        let err = MiningConfig::parse("retarget_interval_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_rejects_bad_toml() {
        let err = MiningConfig::parse("force_mining = maybe").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_long_graffiti_rejected() {
        let config = MiningConfig {
            graffiti: "x".repeat(33),
            ..MiningConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = MiningConfig::load("/nonexistent/notechain-mining.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
