use crate::utils::error::{SentinelError, SentinelResult};

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration for the service sentinel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub scraper: ScraperConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file; ":memory:" selects the in-memory
    /// backend (useful for demos and tests).
    pub database_path: String,
    pub single_lookup_timeout_secs: u64,
    pub range_query_timeout_secs: u64,
    pub batch_insert_timeout_secs: u64,
}

/// One Prometheus exposition endpoint to poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeTarget {
    /// Service name samples from this target are recorded under
    pub service: String,
    /// Base URL, e.g. "http://payments:9100"
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub request_timeout_secs: u64,
    pub targets: Vec<ScrapeTarget>,
    /// Metric names forwarded into the store; everything else on the
    /// exposition page is ignored.
    pub metric_allowlist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Feature-extraction window, minutes
    pub feature_window_mins: u64,
    /// Whole-diagnosis deadline
    pub diagnosis_timeout_secs: u64,
    /// Background sweep over services with recent data
    pub sweep_enabled: bool,
    pub sweep_interval_secs: u64,
    /// Confidence above which detections are persisted
    pub persistence_confidence_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            cors_origins: vec!["http://localhost:3000".to_string()],
            request_timeout_secs: 30,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "data/sentinel.db".to_string(),
            single_lookup_timeout_secs: 3,
            range_query_timeout_secs: 10,
            batch_insert_timeout_secs: 30,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 15,
            request_timeout_secs: 10,
            targets: Vec::new(),
            metric_allowlist: vec![
                "cpu_usage".to_string(),
                "cpu_usage_percent".to_string(),
                "memory_usage".to_string(),
                "memory_usage_percent".to_string(),
                "memory_working_set_bytes".to_string(),
                "error_rate".to_string(),
                "app_errors_total".to_string(),
                "errors_total".to_string(),
                "response_time".to_string(),
                "response_time_p95_ms".to_string(),
                "http_latency".to_string(),
                "request_rate".to_string(),
                "http_requests_total".to_string(),
                "restart_count".to_string(),
            ],
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feature_window_mins: 30,
            diagnosis_timeout_secs: 10,
            sweep_enabled: true,
            sweep_interval_secs: 60,
            persistence_confidence_threshold: 80.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            scraper: ScraperConfig::default(),
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SentinelConfig {
    /// Load configuration with precedence: file -> env -> defaults
    pub fn load() -> SentinelResult<Self> {
        let mut config = Self::default();

        if let Ok(config_path) = env::var("SENTINEL_CONFIG_FILE") {
            if Path::new(&config_path).exists() {
                config = Self::from_file(&config_path)?;
            } else {
                return Err(SentinelError::ConfigurationFileNotFound { path: config_path });
            }
        } else if Path::new("sentinel.toml").exists() {
            config = Self::from_file("sentinel.toml")?;
        }

        config.load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> SentinelResult<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| SentinelError::Configuration {
                reason: format!("Failed to read config file: {e}"),
            })?;

        let config: Self = toml::from_str(&content).map_err(|e| SentinelError::Configuration {
            reason: format!("Failed to parse config file: {e}"),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn load_from_env(&mut self) -> SentinelResult<()> {
        if let Ok(host) = env::var("SENTINEL_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("SENTINEL_PORT") {
            self.server.port = port.parse().map_err(|_| SentinelError::Configuration {
                reason: format!("Invalid port number: {port}"),
            })?;
        }
        if let Ok(path) = env::var("SENTINEL_DB_PATH") {
            self.store.database_path = path;
        }
        if let Ok(enabled) = env::var("SENTINEL_SCRAPER_ENABLED") {
            self.scraper.enabled = enabled.to_lowercase() == "true";
        }
        if let Ok(interval) = env::var("SENTINEL_SCRAPE_INTERVAL") {
            self.scraper.interval_secs =
                interval.parse().map_err(|_| SentinelError::Configuration {
                    reason: format!("Invalid scrape interval: {interval}"),
                })?;
        }
        if let Ok(timeout) = env::var("SENTINEL_DIAGNOSIS_TIMEOUT") {
            self.engine.diagnosis_timeout_secs =
                timeout.parse().map_err(|_| SentinelError::Configuration {
                    reason: format!("Invalid diagnosis timeout: {timeout}"),
                })?;
        }
        if let Ok(enabled) = env::var("SENTINEL_SWEEP_ENABLED") {
            self.engine.sweep_enabled = enabled.to_lowercase() == "true";
        }
        if let Ok(level) = env::var("SENTINEL_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> SentinelResult<()> {
        if self.server.port == 0 {
            return Err(SentinelError::Configuration {
                reason: "Server port cannot be 0".to_string(),
            });
        }
        if self.server.host.is_empty() {
            return Err(SentinelError::Configuration {
                reason: "Server host cannot be empty".to_string(),
            });
        }
        if self.store.database_path.is_empty() {
            return Err(SentinelError::Configuration {
                reason: "Store database path cannot be empty".to_string(),
            });
        }
        if self.engine.feature_window_mins == 0 {
            return Err(SentinelError::Configuration {
                reason: "Feature window must be at least one minute".to_string(),
            });
        }
        if self.engine.diagnosis_timeout_secs == 0 {
            return Err(SentinelError::Configuration {
                reason: "Diagnosis timeout must be greater than 0".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.engine.persistence_confidence_threshold) {
            return Err(SentinelError::Configuration {
                reason: "Persistence confidence threshold must lie in [0, 100]".to_string(),
            });
        }
        if self.scraper.enabled && self.scraper.interval_secs == 0 {
            return Err(SentinelError::Configuration {
                reason: "Scrape interval must be greater than 0".to_string(),
            });
        }
        for target in &self.scraper.targets {
            if target.service.is_empty() || target.url.is_empty() {
                return Err(SentinelError::Configuration {
                    reason: "Scrape targets require both service and url".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Whole-diagnosis deadline as a [`Duration`]
    #[must_use]
    pub fn diagnosis_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.diagnosis_timeout_secs)
    }

    /// Default feature-extraction window as a [`Duration`]
    #[must_use]
    pub fn feature_window(&self) -> Duration {
        Duration::from_secs(self.engine.feature_window_mins * 60)
    }
}
