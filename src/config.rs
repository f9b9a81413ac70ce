use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::models::AutoMatchingCriteria;
use crate::notify::{DigestSchedule, RetryPolicy};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub matching: AutoMatchingCriteria,
    #[serde(default)]
    pub alerts: AlertSettings,
    #[serde(default)]
    pub notification: NotificationSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertSettings {
    /// How far back a newly registered alert scans existing reports
    #[serde(default = "default_retro_window_days")]
    pub retro_window_days: i64,
    /// Active reports older than this are expired by maintenance sweeps
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            retro_window_days: default_retro_window_days(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_retro_window_days() -> i64 { 30 }
fn default_retention_days() -> i64 { 90 }

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Local hour at which daily digests go out
    #[serde(default = "default_daily_send_hour")]
    pub daily_send_hour: u32,
    /// Weekday for weekly digests, 0 = Monday
    #[serde(default)]
    pub weekly_send_weekday: u32,
    #[serde(default = "default_daily_send_hour")]
    pub weekly_send_hour: u32,
    #[serde(default = "default_scheduler_tick_secs")]
    pub scheduler_tick_secs: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            send_timeout_secs: default_send_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            daily_send_hour: default_daily_send_hour(),
            weekly_send_weekday: 0,
            weekly_send_hour: default_daily_send_hour(),
            scheduler_tick_secs: default_scheduler_tick_secs(),
        }
    }
}

fn default_send_timeout_secs() -> u64 { 10 }
fn default_max_attempts() -> u32 { 3 }
fn default_base_backoff_ms() -> u64 { 200 }
fn default_daily_send_hour() -> u32 { 8 }
fn default_scheduler_tick_secs() -> u64 { 60 }

impl NotificationSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            send_timeout: Duration::from_secs(self.send_timeout_secs),
        }
    }

    pub fn digest_schedule(&self) -> DigestSchedule {
        DigestSchedule {
            daily_send_hour: self.daily_send_hour,
            weekly_send_weekday: self.weekly_send_weekday,
            weekly_send_hour: self.weekly_send_hour,
        }
    }

    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_secs(self.scheduler_tick_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with SHELTER_)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            // Local config file for development overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., SHELTER_MATCHING__MAX_DISTANCE_KM -> matching.max_distance_km
            .add_source(
                Environment::with_prefix("SHELTER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("SHELTER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Fail fast on values the engine would otherwise misbehave on
    fn validate(&self) -> Result<(), ConfigError> {
        self.matching
            .validate_config()
            .map_err(ConfigError::Message)?;
        if self.notification.daily_send_hour > 23 || self.notification.weekly_send_hour > 23 {
            return Err(ConfigError::Message("digest send hour must be 0..=23".to_string()));
        }
        if self.notification.weekly_send_weekday > 6 {
            return Err(ConfigError::Message("weekly send weekday must be 0..=6".to_string()));
        }
        if self.alerts.retro_window_days < 0 || self.alerts.retention_days <= 0 {
            return Err(ConfigError::Message("alert day windows must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            matching: AutoMatchingCriteria::default(),
            alerts: AlertSettings::default(),
            notification: NotificationSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Initialize the global tracing subscriber from logging settings
pub fn init_logging(settings: &LoggingSettings) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.level.clone())),
        )
        .with_target(false)
        .with_level(true);

    if settings.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}
