//! Configuration management for the season gauge.
//!
//! The gauge reads an optional JSON file at `~/.season-gauge/config.json`
//! (or the path in `SEASON_GAUGE_CONFIG`). Every section has defaults, so a
//! missing file is not an error.
//!
//! # Configuration Priority
//!
//! 1. Default values
//! 2. Config file values
//! 3. Environment variables
//!
//! # Environment Variable Mapping
//!
//! - `TELE_TOKEN` → notification.bot_token
//! - `USER_ID` → notification.chat_id
//! - `SEASON_LOG_LEVEL` → observability.log_level
//! - `SEASON_LOG_FORMAT` → observability.log_format
//!
//! Empty environment values are treated as unset.
//!
//! # Invalid Values
//!
//! Only an unreadable or unparseable file is an error. Values that parse but
//! are unusable (unknown log format, zero timeout, blank symbol) are reset to
//! their defaults by [`Config::sanitize`], which reports each reset so the
//! caller can log it once logging is up.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ResultExt};

/// Environment variable holding the Telegram bot credential.
pub const ENV_BOT_TOKEN: &str = "TELE_TOKEN";
/// Environment variable holding the Telegram recipient chat id.
pub const ENV_CHAT_ID: &str = "USER_ID";
/// Environment variable overriding the log level.
pub const ENV_LOG_LEVEL: &str = "SEASON_LOG_LEVEL";
/// Environment variable overriding the log format.
pub const ENV_LOG_FORMAT: &str = "SEASON_LOG_FORMAT";
/// Environment variable pointing at an explicit config file.
pub const ENV_CONFIG_PATH: &str = "SEASON_GAUGE_CONFIG";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".season-gauge"),
        |dirs| dirs.home_dir().join(".season-gauge"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir().join("config.json"))
}

// ============================================================================
// Sections
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Telegram delivery configuration.
///
/// `bot_token` and `chat_id` are the only secrets the gauge needs. When either
/// is missing, delivery is disabled and the report is only logged.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Bot API credential
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Recipient chat id
    #[serde(default)]
    pub chat_id: Option<String>,

    /// Bot API base URL
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl NotificationConfig {
    /// Both credentials are present.
    pub fn is_configured(&self) -> bool {
        has_value(&self.bot_token) && has_value(&self.chat_id)
    }
}

// Keeps the bot token out of logs.
impl std::fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "***"))
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: default_telegram_api_base(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Upstream data provider endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// FRED base URL (graph CSV endpoint lives under it)
    #[serde(default = "default_fred_base_url")]
    pub fred_base_url: String,

    /// Yahoo Finance base URL (chart and quote endpoints live under it)
    #[serde(default = "default_yahoo_base_url")]
    pub yahoo_base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User agent sent to data providers
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            fred_base_url: default_fred_base_url(),
            yahoo_base_url: default_yahoo_base_url(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Symbols tracked by the price and valuation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistConfig {
    /// Broad market index proxy
    #[serde(default = "default_market_index")]
    pub market_index: String,

    /// AI infrastructure periphery stock
    #[serde(default = "default_ai_periphery")]
    pub ai_periphery: String,

    /// Company whose trailing/forward EPS feed the valuation rule.
    /// `None` disables the valuation lookup.
    #[serde(default = "default_valuation_symbol")]
    pub valuation_symbol: Option<String>,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            market_index: default_market_index(),
            ai_periphery: default_ai_periphery(),
            valuation_symbol: default_valuation_symbol(),
        }
    }
}

/// A value replaced by its default during [`Config::sanitize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    /// Dotted path of the field, e.g. `observability.log_format`
    pub field: &'static str,
    /// Value that was rejected
    pub rejected: String,
    /// Value used instead
    pub fallback: String,
}

impl std::fmt::Display for Adjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} = \"{}\" is invalid, using \"{}\"",
            self.field, self.rejected, self.fallback
        )
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Telegram delivery
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Data provider endpoints
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Tracked symbols
    #[serde(default)]
    pub watchlist: WatchlistConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse config from {}: {e}", path.display()))
        })
    }

    /// Load configuration with environment variable overrides, then sanitize.
    ///
    /// Returns the usable config together with every value that had to be
    /// reset. Fails only when the file exists but cannot be read or parsed.
    pub fn load_with_env() -> Result<(Self, Vec<Adjustment>)> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        let adjustments = config.sanitize();
        Ok((config, adjustments))
    }

    /// Defaults plus environment overrides, ignoring any config file.
    ///
    /// Used to reach the chat when the file itself is broken.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.sanitize();
        config
    }

    /// Apply environment variable overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(ENV_BOT_TOKEN) {
            self.notification.bot_token = Some(token);
        }
        if let Some(chat_id) = get(ENV_CHAT_ID) {
            self.notification.chat_id = Some(chat_id);
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            self.observability.log_level = level;
        }
        if let Some(format) = get(ENV_LOG_FORMAT) {
            self.observability.log_format = format;
        }
    }

    /// Reset unusable values to their defaults.
    ///
    /// A blank `valuation_symbol` turns the valuation lookup off rather than
    /// falling back to the default company.
    pub fn sanitize(&mut self) -> Vec<Adjustment> {
        let mut adjustments = Vec::new();

        let observability = &mut self.observability;
        let level = observability.log_level.trim().to_ascii_lowercase();
        if LOG_LEVELS.contains(&level.as_str()) {
            observability.log_level = level;
        } else {
            reset(
                &mut adjustments,
                "observability.log_level",
                &mut observability.log_level,
                default_log_level(),
            );
        }
        let format = observability.log_format.trim().to_ascii_lowercase();
        if LOG_FORMATS.contains(&format.as_str()) {
            observability.log_format = format;
        } else {
            reset(
                &mut adjustments,
                "observability.log_format",
                &mut observability.log_format,
                default_log_format(),
            );
        }

        if self.sources.timeout_secs == 0 {
            reset_timeout(
                &mut adjustments,
                "sources.timeout_secs",
                &mut self.sources.timeout_secs,
            );
        }
        if self.notification.timeout_secs == 0 {
            reset_timeout(
                &mut adjustments,
                "notification.timeout_secs",
                &mut self.notification.timeout_secs,
            );
        }

        let watchlist = &mut self.watchlist;
        if watchlist.market_index.trim().is_empty() {
            reset(
                &mut adjustments,
                "watchlist.market_index",
                &mut watchlist.market_index,
                default_market_index(),
            );
        }
        if watchlist.ai_periphery.trim().is_empty() {
            reset(
                &mut adjustments,
                "watchlist.ai_periphery",
                &mut watchlist.ai_periphery,
                default_ai_periphery(),
            );
        }
        if has_blank(&watchlist.valuation_symbol) {
            adjustments.push(Adjustment {
                field: "watchlist.valuation_symbol",
                rejected: watchlist.valuation_symbol.take().unwrap_or_default(),
                fallback: "null".to_string(),
            });
        }

        adjustments
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];
const LOG_FORMATS: &[&str] = &["json", "pretty"];

fn reset(
    adjustments: &mut Vec<Adjustment>,
    field: &'static str,
    value: &mut String,
    fallback: String,
) {
    adjustments.push(Adjustment {
        field,
        rejected: std::mem::replace(value, fallback.clone()),
        fallback,
    });
}

fn reset_timeout(adjustments: &mut Vec<Adjustment>, field: &'static str, value: &mut u64) {
    *value = default_timeout();
    adjustments.push(Adjustment {
        field,
        rejected: "0".to_string(),
        fallback: value.to_string(),
    });
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn has_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| v.trim().is_empty())
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}
fn default_fred_base_url() -> String {
    "https://fred.stlouisfed.org".to_string()
}
fn default_yahoo_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) season-gauge".to_string()
}
fn default_market_index() -> String {
    "SPY".to_string()
}
fn default_ai_periphery() -> String {
    "VRT".to_string()
}
fn default_valuation_symbol() -> Option<String> {
    Some("NVDA".to_string())
}
