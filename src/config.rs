//! Configuration management with validation and defaults
//!
//! Loaded from an optional TOML file, then overridden from `DICE_*`
//! environment variables, then validated.

use crate::errors::{ConfigurationError, DiceResult};
use crate::games::odds::OddsTable;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Complete table configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiceConfig {
    pub round: RoundConfig,
    pub dispatch: DispatchConfig,
    pub economy: EconomyConfig,
    pub odds: OddsTable,
    pub monitoring: MonitoringConfig,
    pub storage: StorageConfig,
}

/// Round timing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoundConfig {
    /// How long bets are accepted after a round opens
    pub betting_window_secs: u64,
    /// How long the privileged roller has to throw all three dice
    pub roll_window_secs: u64,
    /// Pause after results before the next round opens
    pub result_pause_secs: u64,
    /// Gap between automated dice so each lands visibly
    pub auto_die_interval_ms: u64,
    /// Optional animation (file id or URL) sent when a round opens
    pub opening_animation: Option<String>,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            betting_window_secs: 60,
            roll_window_secs: 30,
            result_pause_secs: 5,
            auto_die_interval_ms: 2000,
            opening_animation: None,
        }
    }
}

/// Retry policy for outbound chat calls
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    pub message_max_attempts: u32,
    pub message_initial_backoff_ms: u64,
    /// Ceiling for the doubling backoff
    pub message_max_backoff_ms: u64,
    pub die_max_attempts: u32,
    /// Fixed wait after a network failure while throwing a die
    pub die_network_wait_ms: u64,
    /// Ceiling applied to any server-signalled retry-after
    pub max_signalled_wait_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            message_max_attempts: 5,
            message_initial_backoff_ms: 1000,
            message_max_backoff_ms: 30_000,
            die_max_attempts: 3,
            die_network_wait_ms: 5000,
            max_signalled_wait_ms: 60_000,
        }
    }
}

/// Currency settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EconomyConfig {
    /// Balance credited to a newly registered player
    pub default_balance: i64,
    /// Name of the base stake unit shown in messages
    pub currency_unit: String,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            default_balance: 1000,
            currency_unit: "coins".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: LogLevel,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// File holding the next issue number; in-memory counter when unset
    pub issue_counter_path: Option<String>,
}

impl DiceConfig {
    /// Short timings for tests and local play
    pub fn fast_testing() -> Self {
        Self {
            round: RoundConfig {
                betting_window_secs: 5,
                roll_window_secs: 5,
                result_pause_secs: 1,
                auto_die_interval_ms: 100,
                opening_animation: None,
            },
            dispatch: DispatchConfig {
                message_initial_backoff_ms: 100,
                message_max_backoff_ms: 1000,
                die_network_wait_ms: 500,
                max_signalled_wait_ms: 5000,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.round.betting_window_secs == 0 {
            return Err(invalid("round.betting_window_secs", "0", "must be > 0"));
        }
        if self.round.roll_window_secs == 0 {
            return Err(invalid("round.roll_window_secs", "0", "must be > 0"));
        }
        if self.dispatch.message_max_attempts == 0 {
            return Err(invalid("dispatch.message_max_attempts", "0", "must be > 0"));
        }
        if self.dispatch.die_max_attempts == 0 {
            return Err(invalid("dispatch.die_max_attempts", "0", "must be > 0"));
        }
        if self.dispatch.message_initial_backoff_ms > self.dispatch.message_max_backoff_ms {
            return Err(ConfigurationError::ValidationFailed(
                "dispatch.message_initial_backoff_ms exceeds message_max_backoff_ms".to_string(),
            ));
        }
        if self.economy.default_balance < 0 {
            return Err(invalid(
                "economy.default_balance",
                &self.economy.default_balance.to_string(),
                "must not be negative",
            ));
        }

        for sum in crate::games::types::MIN_SUM_TARGET..=crate::games::types::MAX_SUM_TARGET {
            if self.odds.sum_odds(sum).is_none() {
                return Err(ConfigurationError::ValidationFailed(format!(
                    "odds.sum has no entry for {}",
                    sum
                )));
            }
        }

        Ok(())
    }

    pub fn betting_window(&self) -> Duration {
        Duration::from_secs(self.round.betting_window_secs)
    }

    pub fn roll_window(&self) -> Duration {
        Duration::from_secs(self.round.roll_window_secs)
    }

    pub fn result_pause(&self) -> Duration {
        Duration::from_secs(self.round.result_pause_secs)
    }

    pub fn auto_die_interval(&self) -> Duration {
        Duration::from_millis(self.round.auto_die_interval_ms)
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> DiceResult<DiceConfig> {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => DiceConfig::default(),
        };

        Self::apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(path: &str) -> Result<DiceConfig, ConfigurationError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;
        Self::parse(&content)
    }

    /// Parse TOML text into a config, missing sections taking defaults
    pub fn parse(content: &str) -> Result<DiceConfig, ConfigurationError> {
        toml::from_str(content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)))
    }

    fn apply_env_overrides(config: &mut DiceConfig) -> Result<(), ConfigurationError> {
        if let Some(secs) = env_parse::<u64>("DICE_BETTING_WINDOW_SECS")? {
            config.round.betting_window_secs = secs;
        }
        if let Some(secs) = env_parse::<u64>("DICE_ROLL_WINDOW_SECS")? {
            config.round.roll_window_secs = secs;
        }
        if let Some(secs) = env_parse::<u64>("DICE_RESULT_PAUSE_SECS")? {
            config.round.result_pause_secs = secs;
        }
        if let Some(balance) = env_parse::<i64>("DICE_DEFAULT_BALANCE")? {
            config.economy.default_balance = balance;
        }
        if let Some(level) = env_parse::<LogLevel>("DICE_LOG_LEVEL")? {
            config.monitoring.log_level = level;
        }
        if let Ok(path) = env::var("DICE_ISSUE_COUNTER_PATH") {
            config.storage.issue_counter_path = Some(path);
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigurationError> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| ConfigurationError::InvalidValue {
            field: key.to_string(),
            value,
            reason: "could not be parsed".to_string(),
        }),
        Err(_) => Ok(None),
    }
}
