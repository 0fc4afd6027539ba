//! Configuration for the pension ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,

    /// Pension policy constants
    pub policy: PolicyConfig,

    /// Chain mirror side-channel configuration
    pub mirror: MirrorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/pension-ledger"),
            service_name: "pension-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            rocksdb: RocksDbConfig::default(),
            policy: PolicyConfig::default(),
            mirror: MirrorConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Level 0 file num compaction trigger
    pub level0_file_num_compaction_trigger: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            target_file_size_mb: 64,
            max_background_jobs: 4,
            level0_file_num_compaction_trigger: 4,
            enable_statistics: false,
        }
    }
}

/// Pension policy constants
///
/// These mirror the product rules: minimum transaction unit, emergency
/// withdrawal cap and penalty, projection defaults, and the bounds of the
/// stochastic yield bonus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Smallest accepted contribution/transfer/withdrawal amount
    pub minimum_amount: Decimal,

    /// Retirement age used for projections
    pub retirement_age: u32,

    /// Age assumed when a user has none on file
    pub default_age: u32,

    /// Average daily contribution assumed for users without history
    pub default_daily_contribution: Decimal,

    /// Fixed annuity assumption for the monthly pension estimate (months)
    pub annuity_months: u32,

    /// Fraction of the available balance an emergency withdrawal may take
    pub withdrawal_cap_ratio: Decimal,

    /// Penalty fraction applied to the gross withdrawal amount
    pub withdrawal_penalty_ratio: Decimal,

    /// Lower bound of the yield bonus, as a fraction of the contribution
    pub yield_bonus_min_ratio: Decimal,

    /// Upper bound of the yield bonus, as a fraction of the contribution
    pub yield_bonus_max_ratio: Decimal,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            minimum_amount: Decimal::ONE,
            retirement_age: 60,
            default_age: 30,
            default_daily_contribution: Decimal::from(15),
            annuity_months: 180, // 15-year annuity
            withdrawal_cap_ratio: Decimal::new(5, 1),      // 0.5
            withdrawal_penalty_ratio: Decimal::new(10, 2), // 0.10
            yield_bonus_min_ratio: Decimal::new(1, 3),     // 0.001
            yield_bonus_max_ratio: Decimal::new(4, 3),     // 0.004
        }
    }
}

/// Chain mirror side-channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Whether mirroring is attempted at all
    pub enabled: bool,

    /// Upper bound on a single mirror attempt (milliseconds)
    pub timeout_ms: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: 500,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults with environment variable overrides
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("PENSION_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(enabled) = std::env::var("PENSION_MIRROR_ENABLED") {
            config.mirror.enabled = enabled == "1" || enabled.eq_ignore_ascii_case("true");
        }

        if let Ok(timeout) = std::env::var("PENSION_MIRROR_TIMEOUT_MS") {
            config.mirror.timeout_ms = timeout
                .parse()
                .map_err(|e| crate::Error::Config(format!("Bad mirror timeout: {}", e)))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "pension-ledger");
        assert_eq!(config.policy.retirement_age, 60);
        assert_eq!(config.policy.annuity_months, 180);
        assert!(!config.mirror.enabled);
    }

    #[test]
    fn test_policy_ratios() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.withdrawal_cap_ratio, Decimal::new(5, 1));
        assert_eq!(policy.withdrawal_penalty_ratio, Decimal::new(1, 1));
        assert!(policy.yield_bonus_min_ratio < policy.yield_bonus_max_ratio);
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.policy.minimum_amount, config.policy.minimum_amount);
        assert_eq!(parsed.data_dir, config.data_dir);
    }
}
