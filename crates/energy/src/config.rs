//! Accumulator and store configuration.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// What a reconciliation cycle does with its taps when the remote read or write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// The cycle's taps are lost from the remote total (at-most-once per cycle).
    #[default]
    Drop,
    /// The cycle's taps go back into the pending counter and are retried next cycle.
    Requeue,
}

/// Tap accumulator configuration.
#[derive(Debug, Clone)]
pub struct AccumulatorConfig {
    /// Period between reconciliation cycles.
    pub reconcile_period_ms: u64,
    /// Energy credited per registered tap.
    pub per_tap_energy: u64,
    /// Ceiling on taps flushed in a single cycle.
    pub max_taps_per_cycle: u64,
    pub on_failure: FailurePolicy,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            reconcile_period_ms: 600,
            per_tap_energy: 2,
            max_taps_per_cycle: 1500,
            on_failure: FailurePolicy::Drop,
        }
    }
}

impl AccumulatorConfig {
    pub fn reconcile_period(&self) -> Duration {
        Duration::from_millis(self.reconcile_period_ms)
    }

    /// Defaults overridden by `TAP_RECONCILE_PERIOD_MS`, `TAP_ENERGY_PER_TAP`,
    /// `TAP_MAX_PER_CYCLE` and `TAP_REQUEUE_ON_FAILURE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            reconcile_period_ms: parse_or(&lookup, "TAP_RECONCILE_PERIOD_MS", defaults.reconcile_period_ms)?,
            per_tap_energy: parse_or(&lookup, "TAP_ENERGY_PER_TAP", defaults.per_tap_energy)?,
            max_taps_per_cycle: parse_or(&lookup, "TAP_MAX_PER_CYCLE", defaults.max_taps_per_cycle)?,
            on_failure: if parse_or(&lookup, "TAP_REQUEUE_ON_FAILURE", false)? {
                FailurePolicy::Requeue
            } else {
                FailurePolicy::Drop
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconcile_period_ms == 0 {
            return Err(ConfigError::Zero("reconcile_period_ms"));
        }
        if self.per_tap_energy == 0 {
            return Err(ConfigError::Zero("per_tap_energy"));
        }
        if self.max_taps_per_cycle == 0 {
            return Err(ConfigError::Zero("max_taps_per_cycle"));
        }
        Ok(())
    }
}

/// Hosted REST backend (PostgREST / Supabase) connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Anonymous API key; sent as `apikey` and bearer token.
    pub api_key: String,
    /// Energy table name.
    pub table: String,
    pub request_timeout_secs: u64,
}

impl StoreConfig {
    pub const DEFAULT_TABLE: &'static str = "zevru_players";

    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            table: Self::DEFAULT_TABLE.to_string(),
            request_timeout_secs: 10,
        }
    }

    /// `SUPABASE_URL` and `SUPABASE_ANON_KEY` are required; `ENERGY_TABLE` and
    /// `STORE_TIMEOUT_SECS` are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = required(&lookup, "SUPABASE_URL")?;
        let api_key = required(&lookup, "SUPABASE_ANON_KEY")?;
        let mut config = Self::new(url, api_key);
        if let Some(table) = lookup("ENERGY_TABLE").filter(|t| !t.trim().is_empty()) {
            config.table = table.trim().to_string();
        }
        config.request_timeout_secs = parse_or(&lookup, "STORE_TIMEOUT_SECS", config.request_timeout_secs)?;
        if config.request_timeout_secs == 0 {
            return Err(ConfigError::Zero("STORE_TIMEOUT_SECS"));
        }
        Ok(config)
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<String, ConfigError> {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}
