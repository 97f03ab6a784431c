//! Engine configuration and logging setup.
//!
//! Configuration is read once at setup from a TOML file, optionally adjusted
//! from environment variables, validated, and then handed to
//! [`RewardsManager::from_config`](crate::RewardsManager::from_config).

use crate::access::AccessControl;
use crate::errors::{Result, RewardsError};
use crate::state::RewardsParams;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const ENV_ISSUANCE_PER_BLOCK: &str = "CURATION_REWARDS_ISSUANCE_PER_BLOCK";
pub const ENV_MINIMUM_SUBGRAPH_SIGNAL: &str = "CURATION_REWARDS_MINIMUM_SUBGRAPH_SIGNAL";
pub const ENV_LOG_LEVEL: &str = "CURATION_REWARDS_LOG_LEVEL";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `rewards=debug`
    pub level: String,
    /// Include module targets in log lines
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: true,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsConfig {
    pub access: AccessControl,
    #[serde(default)]
    pub params: RewardsParams,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RewardsConfig {
    pub fn new(access: AccessControl, params: RewardsParams) -> Self {
        Self {
            access,
            params,
            logging: LoggingConfig::default(),
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RewardsError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from file, apply environment overrides and validate.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(target: "rewards", "Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        info!(target: "rewards", "Configuration loaded successfully");
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`load_from_file`](Self::load_from_file)).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup(ENV_ISSUANCE_PER_BLOCK) {
            self.params.issuance_per_block = parse_amount(ENV_ISSUANCE_PER_BLOCK, &val)?;
        }

        if let Some(val) = lookup(ENV_MINIMUM_SUBGRAPH_SIGNAL) {
            self.params.minimum_subgraph_signal = parse_amount(ENV_MINIMUM_SUBGRAPH_SIGNAL, &val)?;
        }

        if let Some(val) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = val;
        }

        Ok(())
    }

    /// Reject configurations that would leave a role unusable.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("access.governor", &self.access.governor),
            ("access.staking", &self.access.staking),
            ("access.curation", &self.access.curation),
        ];
        for (name, address) in required {
            if address.is_zero() {
                return Err(RewardsError::InvalidParameter {
                    name,
                    reason: "address must not be zero".to_string(),
                });
            }
        }

        if matches!(self.access.availability_oracle, Some(oracle) if oracle.is_zero()) {
            return Err(RewardsError::InvalidParameter {
                name: "access.availability_oracle",
                reason: "address must not be zero".to_string(),
            });
        }

        EnvFilter::try_new(&self.logging.level).map_err(|e| RewardsError::InvalidParameter {
            name: "logging.level",
            reason: e.to_string(),
        })?;

        Ok(())
    }
}

fn parse_amount(name: &'static str, value: &str) -> Result<u128> {
    value
        .trim()
        .parse::<u128>()
        .map_err(|e| RewardsError::InvalidParameter {
            name,
            reason: format!("{value:?} is not a base-unit amount: {e}"),
        })
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// when a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init()
        .is_ok()
}
