//! Application configuration
//!
//! Loaded from TOML (default `~/.config/parkiraj/config.toml`). Every
//! section and field has a default, so an empty or missing file is a valid
//! configuration.
//!
//! ```toml
//! [server]
//! api_port = 8080
//!
//! [reservations]
//! default_duration_minutes = 10
//! sweep_interval_secs = 1
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::{AllocatorConfig, ExpiryConfig};
use crate::infrastructure::DatabaseConfig;
use crate::shared::{InfraError, RetryConfig};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV_VAR: &str = "PARKIRAJ_CONFIG";

/// `$PARKIRAJ_CONFIG`, else `<config dir>/parkiraj/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs_next::config_dir()
        .map(|dir| dir.join("parkiraj").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub logging: LoggingConfig,
    pub reservations: ReservationSettings,
    pub retry: RetrySettings,
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Seconds to wait for background tasks on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://./parkiraj.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseSettings {
    pub fn connection_url(&self) -> String {
        self.url.clone()
    }

    pub fn to_database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.connection_url(),
            max_connections: self.max_connections,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `parkiraj=debug,sqlx=warn`
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationSettings {
    pub default_duration_minutes: i64,
    pub max_duration_minutes: i64,
    pub sweep_interval_secs: u64,
    pub sweep_batch_size: usize,
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            default_duration_minutes: 10,
            max_duration_minutes: 24 * 60,
            sweep_interval_secs: 1,
            sweep_batch_size: 500,
        }
    }
}

impl ReservationSettings {
    pub fn default_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.default_duration_minutes)
    }

    pub fn max_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.max_duration_minutes)
    }

    pub fn expiry_config(&self) -> ExpiryConfig {
        ExpiryConfig {
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            batch_size: self.sweep_batch_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
    /// Share of each delay that is randomized, 0.0 to 1.0
    pub jitter: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 10,
            backoff_multiplier: 2.0,
            max_delay_ms: 200,
            jitter: 0.5,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(s: &RetrySettings) -> Self {
        RetryConfig {
            max_attempts: s.max_attempts,
            initial_delay: Duration::from_millis(s.initial_delay_ms),
            backoff_multiplier: s.backoff_multiplier,
            max_delay: Duration::from_millis(s.max_delay_ms),
            jitter: s.jitter,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// JSON file with locations to insert on startup
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Read and validate `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, InfraError> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        let invalid = |msg: &str| Err(InfraError::InvalidConfig(msg.to_string()));

        if self.server.api_port == 0 {
            return invalid("server.api_port must be non-zero");
        }
        if self.database.url.trim().is_empty() {
            return invalid("database.url must not be empty");
        }
        if !matches!(self.logging.format.to_lowercase().as_str(), "pretty" | "json") {
            return invalid("logging.format must be \"pretty\" or \"json\"");
        }
        let r = &self.reservations;
        if r.default_duration_minutes <= 0 || r.max_duration_minutes <= 0 {
            return invalid("reservation durations must be positive");
        }
        if r.default_duration_minutes > r.max_duration_minutes {
            return invalid("reservations.default_duration_minutes exceeds max_duration_minutes");
        }
        if r.sweep_interval_secs == 0 || r.sweep_batch_size == 0 {
            return invalid("sweep interval and batch size must be non-zero");
        }
        if self.retry.max_attempts == 0 || self.retry.backoff_multiplier < 1.0 {
            return invalid("retry.max_attempts must be >= 1 and backoff_multiplier >= 1.0");
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return invalid("retry.jitter must be between 0.0 and 1.0");
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.retry)
    }

    pub fn allocator_config(&self) -> AllocatorConfig {
        AllocatorConfig {
            retry: self.retry_config(),
            max_duration: self.reservations.max_duration(),
        }
    }

    pub fn api_address(&self) -> String {
        format!("{}:{}", self.server.api_host, self.server.api_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.server.api_port, 8080);
        assert_eq!(config.reservations.default_duration_minutes, 10);
        assert_eq!(config.reservations.sweep_batch_size, 500);
        assert_eq!(config.database.url, "sqlite://./parkiraj.db?mode=rwc");
        assert_eq!(config.retry_config().max_attempts, 5);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            api_port = 9090

            [reservations]
            default_duration_minutes = 15

            [logging]
            format = "json"

            [seed]
            path = "/etc/parkiraj/locations.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.api_port, 9090);
        assert_eq!(config.server.api_host, "0.0.0.0");
        assert_eq!(config.reservations.default_duration(), chrono::Duration::minutes(15));
        assert_eq!(config.reservations.max_duration_minutes, 1440);
        assert_eq!(config.logging.format, "json");
        assert_eq!(
            config.seed.path.as_deref(),
            Some(Path::new("/etc/parkiraj/locations.json"))
        );
        assert_eq!(config.api_address(), "0.0.0.0:9090");
    }

    #[test]
    fn inconsistent_durations_are_rejected() {
        let err = AppConfig::from_toml(
            r#"
            [reservations]
            default_duration_minutes = 120
            max_duration_minutes = 60
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, InfraError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = AppConfig::from_toml("[server\napi_port = ").unwrap_err();
        assert!(matches!(err, InfraError::Config(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/parkiraj/config.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn retry_settings_convert() {
        let retry = RetryConfig::from(&RetrySettings {
            max_attempts: 3,
            initial_delay_ms: 5,
            backoff_multiplier: 3.0,
            max_delay_ms: 50,
            jitter: 0.25,
        });
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.initial_delay, Duration::from_millis(5));
        assert_eq!(retry.max_delay, Duration::from_millis(50));
        assert_eq!(retry.jitter, 0.25);
    }

    #[test]
    fn jitter_outside_unit_range_is_rejected() {
        let err = AppConfig::from_toml("[retry]\njitter = 1.5\n").unwrap_err();
        assert!(matches!(err, InfraError::InvalidConfig(_)));
    }
}
