//! Claimer configuration

use crate::captcha::SolverKind;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_FAUCET_API: &str = "https://faucet.iopn.tech/api/faucet";

/// Claimer configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimerConfig {
    /// Chat bot credential
    pub bot_token: String,

    /// Faucet API base URL
    pub faucet_api: String,

    /// Hours between scheduled batch runs
    pub claim_interval_hours: u64,

    /// Wallet store file
    pub wallets_file: PathBuf,

    /// Pause between wallets in a batch (milliseconds)
    pub claim_delay_ms: u64,

    /// Delay before the first scheduled batch (seconds)
    pub initial_delay_secs: u64,

    /// Per-request HTTP timeout (seconds)
    pub request_timeout_secs: u64,

    /// Directory for transient secret exports
    pub export_dir: PathBuf,

    /// Bind address for `/metrics`; disabled when unset
    pub metrics_addr: Option<String>,

    /// CAPTCHA strategy
    pub solver: SolverKind,
}

impl Default for ClaimerConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            faucet_api: DEFAULT_FAUCET_API.to_string(),
            claim_interval_hours: 24,
            wallets_file: PathBuf::from("wallets.json"),
            claim_delay_ms: 5000,
            initial_delay_secs: 60,
            request_timeout_secs: 30,
            export_dir: PathBuf::from("."),
            metrics_addr: None,
            solver: SolverKind::Svg,
        }
    }
}

impl fmt::Debug for ClaimerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimerConfig")
            .field("bot_token", &"<redacted>")
            .field("faucet_api", &self.faucet_api)
            .field("claim_interval_hours", &self.claim_interval_hours)
            .field("wallets_file", &self.wallets_file)
            .field("claim_delay_ms", &self.claim_delay_ms)
            .field("initial_delay_secs", &self.initial_delay_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("export_dir", &self.export_dir)
            .field("metrics_addr", &self.metrics_addr)
            .field("solver", &self.solver)
            .finish()
    }
}

fn parse_var<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: format!("'{}': {}", raw, e),
    })
}

impl ClaimerConfig {
    /// Load from environment variables with defaults, then validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_vars(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from a variable lookup (environment-style names).
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("BOT_TOKEN") {
            self.bot_token = token;
        }

        if let Some(url) = get("FAUCET_API") {
            self.faucet_api = url;
        }

        if let Some(hours) = get("CLAIM_INTERVAL") {
            self.claim_interval_hours = parse_var("CLAIM_INTERVAL", &hours)?;
        }

        if let Some(path) = get("WALLETS_FILE") {
            self.wallets_file = PathBuf::from(path);
        }

        if let Some(delay) = get("CLAIM_DELAY_MS") {
            self.claim_delay_ms = parse_var("CLAIM_DELAY_MS", &delay)?;
        }

        if let Some(delay) = get("INITIAL_DELAY_SECS") {
            self.initial_delay_secs = parse_var("INITIAL_DELAY_SECS", &delay)?;
        }

        if let Some(timeout) = get("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", &timeout)?;
        }

        if let Some(dir) = get("EXPORT_DIR") {
            self.export_dir = PathBuf::from(dir);
        }

        if let Some(addr) = get("METRICS_ADDR") {
            self.metrics_addr = Some(addr);
        }

        if let Some(solver) = get("CAPTCHA_SOLVER") {
            self.solver = parse_var("CAPTCHA_SOLVER", &solver)?;
        }

        Ok(())
    }

    /// Reject configurations the process cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::Missing("BOT_TOKEN"));
        }

        if !(self.faucet_api.starts_with("http://") || self.faucet_api.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "FAUCET_API",
                reason: format!("'{}' is not an http(s) URL", self.faucet_api),
            });
        }

        if self.claim_interval_hours == 0 {
            return Err(ConfigError::Invalid {
                key: "CLAIM_INTERVAL",
                reason: "must be at least 1 hour".to_string(),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "REQUEST_TIMEOUT_SECS",
                reason: "must be positive".to_string(),
            });
        }

        Ok(())
    }

    pub fn claim_interval(&self) -> Duration {
        Duration::from_secs(self.claim_interval_hours * 3600)
    }

    pub fn claim_delay(&self) -> Duration {
        Duration::from_millis(self.claim_delay_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
