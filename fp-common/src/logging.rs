//! Tracing subscriber setup
//!
//! stderr output honours `RUST_LOG` when set, otherwise the configured level.
//! Every configured log file gets its own layer and level filter.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Parse a level name ("info", "DEBUG", ...) into a filter
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    level
        .trim()
        .to_ascii_lowercase()
        .parse::<LevelFilter>()
        .map_err(|_| Error::Config(format!("Unknown log level: {}", level)))
}

/// Install the global tracing subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = parse_level(&config.level)?;
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let mut layers: Vec<BoxedLayer> = vec![fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter)
        .boxed()];

    for file_config in &config.files {
        let file_level = parse_level(&file_config.level)?;
        if let Some(parent) = file_config.filename.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_config.filename)?;

        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(file_level)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_accepts_any_case() {
        assert_eq!(parse_level("info").unwrap(), LevelFilter::INFO);
        assert_eq!(parse_level("DEBUG").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_level(" warn ").unwrap(), LevelFilter::WARN);
    }

    #[test]
    fn test_parse_level_rejects_garbage() {
        assert!(matches!(parse_level("loud"), Err(Error::Config(_))));
    }
}
