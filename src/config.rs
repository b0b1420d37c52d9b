//! Run configuration: budgets, concurrency, timeouts and rate-limit tuning.
//!
//! Loaded in layers — defaults, then an optional TOML file, then environment
//! variable overrides — each layer logged as it's applied. There is no
//! command-line layer here; the CLI surface is out of scope for this crate.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_api_calls_budget() -> u32 {
    100
}
fn default_wall_clock_budget_secs() -> u64 {
    300
}
fn default_max_parallel_analyzers() -> usize {
    4
}
fn default_http_call_timeout_secs() -> u64 {
    30
}
fn default_analyzer_timeout_secs() -> u64 {
    90
}
fn default_run_timeout_secs() -> u64 {
    300
}
fn default_requests_per_second() -> f64 {
    5.0
}
fn default_backoff_base_millis() -> u64 {
    1_000
}
fn default_backoff_cap_millis() -> u64 {
    30_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Budgets and concurrency limits shared by the orchestrator and the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_api_calls_budget")]
    pub api_calls_budget: u32,
    #[serde(default = "default_wall_clock_budget_secs")]
    pub wall_clock_budget_secs: u64,
    #[serde(default = "default_max_parallel_analyzers")]
    pub max_parallel_analyzers: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            api_calls_budget: default_api_calls_budget(),
            wall_clock_budget_secs: default_wall_clock_budget_secs(),
            max_parallel_analyzers: default_max_parallel_analyzers(),
        }
    }
}

impl BudgetConfig {
    pub fn wall_clock_budget(&self) -> Duration {
        Duration::from_secs(self.wall_clock_budget_secs)
    }
}

/// Per-call, per-analyzer and per-run timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_http_call_timeout_secs")]
    pub http_call_timeout_secs: u64,
    #[serde(default = "default_analyzer_timeout_secs")]
    pub analyzer_timeout_secs: u64,
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            http_call_timeout_secs: default_http_call_timeout_secs(),
            analyzer_timeout_secs: default_analyzer_timeout_secs(),
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn http_call_timeout(&self) -> Duration {
        Duration::from_secs(self.http_call_timeout_secs)
    }
    pub fn analyzer_timeout(&self) -> Duration {
        Duration::from_secs(self.analyzer_timeout_secs)
    }
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

/// Token-bucket rate limiter tuning, consumed by [`crate::ratelimit::RateLimiter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    #[serde(default = "default_backoff_base_millis")]
    pub backoff_base_millis: u64,
    #[serde(default = "default_backoff_cap_millis")]
    pub backoff_cap_millis: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            backoff_base_millis: default_backoff_base_millis(),
            backoff_cap_millis: default_backoff_cap_millis(),
            max_retries: default_max_retries(),
        }
    }
}

/// Structured-logging tuning. The format itself (JSON to stderr) is fixed by
/// [`crate::logging::init`]; this only controls the level filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

/// Deployment connection details. `token` is never logged or serialized into
/// a report; it only ever flows into the `Authorization` header.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
}

/// Top-level run configuration: defaults, optionally overridden by a TOML
/// file, then by environment variables. Never touches argv.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

const CANDIDATE_CONFIG_PATHS: &[&str] =
    &["cribl-hc.toml", "conf/cribl-hc.toml", "./cribl-hc.toml", "./conf/cribl-hc.toml"];

impl Config {
    /// Loads defaults, layers an optional TOML file, then environment
    /// variables, then validates. Each override is logged so a misbehaving
    /// run can be traced back to its source.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = match Self::find_config_file() {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading config file");
                Self::from_toml(&path)?
            },
            None => {
                tracing::info!("no config file found, using defaults");
                Self::default()
            },
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn find_config_file() -> Option<PathBuf> {
        if let Ok(explicit) = std::env::var("CRIBL_HC_CONFIG") {
            let path = PathBuf::from(explicit);
            if path.exists() {
                return Some(path);
            }
        }
        CANDIDATE_CONFIG_PATHS.iter().map(PathBuf::from).find(|p| p.exists())
    }

    fn from_toml(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// `CRIBL_URL` / `CRIBL_TOKEN` are the primary way a run is pointed at a
    /// deployment; `RUST_LOG` takes priority over `CRIBL_HC_LOG` for the log
    /// level, matching the ecosystem convention of deferring to `RUST_LOG`
    /// when both are set.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CRIBL_URL") {
            tracing::info!("config override: connection.base_url from CRIBL_URL");
            self.connection.base_url = Some(url);
        }
        if let Ok(token) = std::env::var("CRIBL_TOKEN") {
            tracing::info!("config override: connection.token from CRIBL_TOKEN");
            self.connection.token = Some(token);
        }
        if let Ok(level) = std::env::var("RUST_LOG").or_else(|_| std::env::var("CRIBL_HC_LOG")) {
            tracing::info!(level = %level, "config override: logging.level");
            self.logging.level = level;
        }
        if let Ok(budget) = std::env::var("CRIBL_HC_API_CALLS_BUDGET") {
            if let Ok(parsed) = budget.parse() {
                tracing::info!(value = parsed, "config override: budget.api_calls_budget");
                self.budget.api_calls_budget = parsed;
            }
        }
        if let Ok(parallel) = std::env::var("CRIBL_HC_MAX_PARALLEL_ANALYZERS") {
            if let Ok(parsed) = parallel.parse() {
                tracing::info!(value = parsed, "config override: budget.max_parallel_analyzers");
                self.budget.max_parallel_analyzers = parsed;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.budget.api_calls_budget == 0 {
            bail!("budget.api_calls_budget must be greater than 0");
        }
        if self.budget.max_parallel_analyzers == 0 {
            bail!("budget.max_parallel_analyzers must be greater than 0");
        }
        if self.rate_limit.requests_per_second <= 0.0 {
            bail!("rate_limit.requests_per_second must be greater than 0");
        }
        if self.timeouts.analyzer_timeout_secs > self.timeouts.run_timeout_secs {
            bail!("timeouts.analyzer_timeout_secs cannot exceed timeouts.run_timeout_secs");
        }
        if let Some(url) = &self.connection.base_url {
            url::Url::parse(url)
                .with_context(|| format!("connection.base_url {url} is not a valid URL"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_budget_is_rejected() {
        let mut config = Config::default();
        config.budget.api_calls_budget = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn analyzer_timeout_exceeding_run_timeout_is_rejected() {
        let mut config = Config::default();
        config.timeouts.analyzer_timeout_secs = 999;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_override_sets_connection_and_logging() {
        // std::env::set_var is unsafe since edition 2024; safe here because
        // tests in this module never touch these vars from another thread.
        unsafe {
            std::env::set_var("CRIBL_URL", "https://example.cribl.cloud");
            std::env::set_var("CRIBL_TOKEN", "secret-token");
        }
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.connection.base_url.as_deref(), Some("https://example.cribl.cloud"));
        assert_eq!(config.connection.token.as_deref(), Some("secret-token"));
        unsafe {
            std::env::remove_var("CRIBL_URL");
            std::env::remove_var("CRIBL_TOKEN");
        }
    }
}
