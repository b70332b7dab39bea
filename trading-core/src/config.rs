//! Runtime configuration (spec §6). Follows the teacher's
//! `serde`-deserializable nested-struct convention with a `load` +
//! `validate` pair, trimmed of the compile-time-feature-flag layer
//! (this core has no per-deployment strategy variants to select
//! between) down to the six keys §6 names plus logging/store settings.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReservationReferencePricePolicy {
    LimitPrice,
    LastKnownTick,
    Explicit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub commission_rate: Decimal,
    pub slow_event_threshold_ns: u64,
    pub event_channel_capacity: usize,
    pub tick_cache_ttl_secs: u64,
    pub shutdown_drain_timeout_secs: u64,
    pub reservation_reference_price_policy: ReservationReferencePricePolicy,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// `None` uses an in-memory store (tests, ephemeral runs).
    #[serde(default)]
    pub sqlite_path: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { sqlite_path: None }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            commission_rate: Decimal::new(1, 3), // 0.001
            slow_event_threshold_ns: 1_000_000,  // 1 ms
            event_channel_capacity: 4096,
            tick_cache_ttl_secs: 5,
            shutdown_drain_timeout_secs: 5,
            reservation_reference_price_policy: ReservationReferencePricePolicy::LimitPrice,
            logging: LoggingConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading config file {}", path.as_ref().display()))?;
        let config: Config = toml::from_str(&text).context("parsing config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn tick_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.tick_cache_ttl_secs)
    }

    pub fn shutdown_drain_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_drain_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.commission_rate < Decimal::ZERO {
            bail!("commissionRate must be non-negative");
        }
        if self.event_channel_capacity == 0 {
            bail!("eventChannelCapacity must be positive");
        }
        if self.tick_cache_ttl_secs == 0 {
            bail!("tickCacheTTL must be positive");
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!("invalid log level '{}', must be one of {:?}", self.logging.level, valid_levels);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_channel_capacity_is_rejected() {
        let mut config = Config::default();
        config.event_channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_commission_rate_is_rejected() {
        let mut config = Config::default();
        config.commission_rate = Decimal::new(-1, 3);
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
