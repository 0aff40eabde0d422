//! Configuration loaded by the host and handed to the engine.
//!
//! Lives in `~/.restock/config.toml` unless a path is given explicitly.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RestockError, Result};

/// Environment variable that overrides `telegram.bot_token`.
pub const TELEGRAM_TOKEN_ENV: &str = "RESTOCK_TELEGRAM_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestockConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// IANA timezone every trigger is evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Upper bound on one delivery, retries included.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_secs: u64,
    /// Upper bound on one whole job run, every delivery included.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    /// Route every message to `channels.test`. Fixed for the process lifetime.
    #[serde(default)]
    pub test_mode: bool,
}

fn default_timezone() -> String { "America/Chicago".into() }
fn default_tick_interval() -> u64 { 30 }
fn default_handler_timeout() -> u64 { 10 }
fn default_job_timeout() -> u64 { 120 }
fn default_shutdown_timeout() -> u64 { 5 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            tick_interval_secs: default_tick_interval(),
            handler_timeout_secs: default_handler_timeout(),
            job_timeout_secs: default_job_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            test_mode: false,
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| RestockError::config(format!("Invalid timezone '{}': {e}", self.timezone)))
    }
}

/// Destination per notification kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    pub on_hand: Option<String>,
    pub auto_request: Option<String>,
    pub received: Option<String>,
    pub reassurance: Option<String>,
    /// Defaults to the reassurance channel.
    pub missing_counts: Option<String>,
    /// Personal channel used for everything in test mode.
    pub test: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_api_base() -> String { "https://api.telegram.org".into() }
fn default_max_retries() -> u32 { 3 }

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_api_base(),
            max_retries: default_max_retries(),
        }
    }
}

/// Outbound webhook transport, used instead of Telegram when configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub outbound_url: String,
    /// Shared secret; when set each request carries a SHA-256 signature header.
    pub secret: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.restock/inventory.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).into_owned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_horizon_months")]
    pub horizon_months: u32,
    /// Overrides `horizon_months` when set.
    #[serde(default)]
    pub horizon_days: Option<u32>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_horizon_months() -> u32 { 3 }

/// Upper bounds on the retention horizon, about a century.
pub const MAX_HORIZON_DAYS: u32 = 36_500;
pub const MAX_HORIZON_MONTHS: u32 = 1_200;
fn default_batch_size() -> usize { 500 }

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            horizon_months: default_horizon_months(),
            horizon_days: None,
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// MissingCounts flags items with fewer days of supply than this.
    #[serde(default = "default_low_supply_days")]
    pub low_supply_days: f64,
    /// Reassurance marks items below this as critical.
    #[serde(default = "default_critical_supply_days")]
    pub critical_supply_days: f64,
    /// AutoRequest skips a location when more than this share of counts is missing.
    #[serde(default = "default_max_missing_ratio")]
    pub max_missing_ratio: f64,
}

fn default_low_supply_days() -> f64 { 1.0 }
fn default_critical_supply_days() -> f64 { 2.0 }
fn default_max_missing_ratio() -> f64 { 0.5 }

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            low_supply_days: default_low_supply_days(),
            critical_supply_days: default_critical_supply_days(),
            max_missing_ratio: default_max_missing_ratio(),
        }
    }
}

impl RestockConfig {
    /// Base directory for config and data.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".restock")
    }

    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Load from the default path, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            let mut config = Self::default();
            config.apply_env();
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RestockError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| RestockError::config(format!("Serialize failed: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(TELEGRAM_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.telegram.bot_token = Some(token);
            }
        }
    }

    /// Reject configurations the engine must not start with.
    pub fn validate(&self) -> Result<()> {
        self.engine.tz()?;

        if !(1..=60).contains(&self.engine.tick_interval_secs) {
            return Err(RestockError::config(format!(
                "engine.tick_interval_secs must be within 1..=60, got {}",
                self.engine.tick_interval_secs
            )));
        }
        if self.engine.handler_timeout_secs == 0 {
            return Err(RestockError::config("engine.handler_timeout_secs must be positive"));
        }
        if self.engine.job_timeout_secs == 0 {
            return Err(RestockError::config("engine.job_timeout_secs must be positive"));
        }

        let missing_channel = |name: &str, value: &Option<String>| -> Result<()> {
            match value {
                Some(v) if !v.trim().is_empty() => Ok(()),
                _ => Err(RestockError::config(format!("channels.{name} is not configured"))),
            }
        };
        if self.engine.test_mode {
            missing_channel("test", &self.channels.test)?;
        } else {
            missing_channel("on_hand", &self.channels.on_hand)?;
            missing_channel("auto_request", &self.channels.auto_request)?;
            missing_channel("received", &self.channels.received)?;
            missing_channel("reassurance", &self.channels.reassurance)?;
        }

        if self.retention.horizon_days == Some(0) || (self.retention.horizon_days.is_none() && self.retention.horizon_months == 0) {
            return Err(RestockError::config("retention horizon must be positive"));
        }
        if self.retention.horizon_days.is_some_and(|d| d > MAX_HORIZON_DAYS)
            || (self.retention.horizon_days.is_none() && self.retention.horizon_months > MAX_HORIZON_MONTHS)
        {
            return Err(RestockError::config(format!(
                "retention horizon must be at most {MAX_HORIZON_DAYS} days or {MAX_HORIZON_MONTHS} months"
            )));
        }
        if self.retention.batch_size == 0 {
            return Err(RestockError::config("retention.batch_size must be positive"));
        }
        if !(0.0..=1.0).contains(&self.policy.max_missing_ratio) {
            return Err(RestockError::config("policy.max_missing_ratio must be within 0..=1"));
        }
        Ok(())
    }
}
