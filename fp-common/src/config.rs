//! Bootstrap configuration loaded from a TOML file
//!
//! Resolution order for the file itself:
//! 1. Command-line argument (`--config`)
//! 2. `CONFIG_PATH` environment variable
//! 3. Built-in example configuration (no file at all)
//!
//! Every section carries serde defaults so a partial file still loads.
//! Settings cannot change at runtime; restart to pick up edits.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    pub urban_api: UrbanApiConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub compute: ComputeConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Expose error details (type, source chain) in error responses
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_app_name")]
    pub name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
            name: default_app_name(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level for stderr output (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Additional log files, each with its own level
    #[serde(default)]
    pub files: Vec<FileLoggerConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            files: Vec::new(),
        }
    }
}

/// One file-backed log sink
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FileLoggerConfig {
    pub filename: PathBuf,

    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Prometheus exposition settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,

    #[serde(default)]
    pub disable: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
            disable: false,
        }
    }
}

/// Urban API (territory data service) access
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UrbanApiConfig {
    /// Base host, e.g. `http://localhost:8100`
    pub host: String,

    /// Budget for the liveness probe
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_seconds: f64,

    /// Budget for every other upstream call
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_seconds: f64,
}

/// Prediction model artifact location
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

/// CPU-bound work settings (feature parsing, inference)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ComputeConfig {
    /// Maximum number of compute jobs running at once
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Radius used for neighbourhood features, in metres
    #[serde(default = "default_neighborhood_radius")]
    pub neighborhood_radius_m: f64,

    /// Minimum number of valid buildings required for a prediction
    ///
    /// `None` disables the check.
    #[serde(default)]
    pub min_buildings: Option<usize>,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            neighborhood_radius_m: default_neighborhood_radius(),
            min_buildings: None,
        }
    }
}

/// Resolve the configuration file path
///
/// Command-line argument first, then `CONFIG_PATH`. `None` means
/// "use the built-in example".
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_app_name() -> String {
    format!("floor_predictor_api ({})", env!("CARGO_PKG_VERSION"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9000
}

fn default_ping_timeout() -> f64 {
    2.0
}

fn default_operation_timeout() -> f64 {
    120.0
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/model.json")
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_neighborhood_radius() -> f64 {
    150.0
}

impl Config {
    /// Sample configuration used when no file is given
    pub fn example() -> Self {
        Self {
            app: AppConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                files: vec![FileLoggerConfig {
                    filename: PathBuf::from("logs/info.log"),
                    level: "info".to_string(),
                }],
            },
            metrics: MetricsConfig::default(),
            urban_api: UrbanApiConfig {
                host: "http://localhost:8100".to_string(),
                ping_timeout_seconds: default_ping_timeout(),
                operation_timeout_seconds: default_operation_timeout(),
            },
            model: ModelConfig::default(),
            compute: ComputeConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Could not read config file {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise fall back to [`Config::example`]
    pub fn from_file_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load(path)
            }
            None => {
                info!("No configuration file given, using built-in example configuration");
                Ok(Self::example())
            }
        }
    }

    /// Write the configuration to `path` as pretty TOML
    pub fn dump(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overwrite every section with the values from `other`
    pub fn update(&mut self, other: &Config) {
        self.app = other.app.clone();
        self.logging = other.logging.clone();
        self.metrics = other.metrics.clone();
        self.urban_api = other.urban_api.clone();
        self.model = other.model.clone();
        self.compute = other.compute.clone();
    }

    fn validate(&self) -> Result<()> {
        if self.urban_api.host.trim().is_empty() {
            return Err(Error::Config("urban_api.host must not be empty".to_string()));
        }
        if !(self.urban_api.ping_timeout_seconds > 0.0)
            || !(self.urban_api.operation_timeout_seconds > 0.0)
        {
            return Err(Error::Config(
                "urban_api timeouts must be positive".to_string(),
            ));
        }
        if self.compute.workers == 0 {
            return Err(Error::Config("compute.workers must be at least 1".to_string()));
        }
        Ok(())
    }
}
