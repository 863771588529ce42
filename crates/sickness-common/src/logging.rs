//! Logging configuration and initialization.
//!
//! Central tracing setup for all workspace binaries. Never use `println!`
//! or `eprintln!` in pipeline code; use the structured macros (`info!`,
//! `warn!`, `error!`) with fields:
//!
//! ```rust,ignore
//! use tracing::info;
//!
//! info!(file = %filename, rows = row_count, "Loaded file");
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format.
    #[default]
    Text,
    /// JSON format for structured log collection.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, e.g. "info" or "sickness_ingest=debug,sqlx=warn".
    pub filter: String,

    /// Output format for all layers.
    pub format: LogFormat,

    /// When set, also write logs to a daily-rotated file in this directory.
    pub log_dir: Option<PathBuf>,

    /// File name prefix for rotated log files.
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Text,
            log_dir: None,
            file_prefix: "sickness-ingest".to_string(),
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables.
    ///
    /// - `LOG_FILTER`: filter directive (default "info")
    /// - `LOG_FORMAT`: "text" or "json"
    /// - `LOG_DIR`: enable file output into this directory
    /// - `LOG_FILE_PREFIX`: rotated file prefix
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(filter) = std::env::var("LOG_FILTER") {
            config.filter = filter;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.format = format.parse()?;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Ok(prefix) = std::env::var("LOG_FILE_PREFIX") {
            config.file_prefix = prefix;
        }

        Ok(config)
    }

    /// Override the filter directive.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at binary startup. Returns an error if a subscriber is
/// already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter).context("Failed to parse log filter")?;

    // Each arm builds its own layer stack; the concrete subscriber types
    // differ between text and JSON formatting.
    match &config.log_dir {
        None => match config.format {
            LogFormat::Text => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_writer(std::io::stdout))
                    .try_init()?;
            },
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_writer(std::io::stdout).json())
                    .try_init()?;
            },
        },
        Some(dir) => {
            std::fs::create_dir_all(dir).context("Failed to create log directory")?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // The guard must outlive the process to keep flushing.
            std::mem::forget(guard);

            match config.format {
                LogFormat::Text => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().with_writer(std::io::stdout))
                        .with(fmt::layer().with_writer(writer).with_ansi(false))
                        .try_init()?;
                },
                LogFormat::Json => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().with_writer(std::io::stdout).json())
                        .with(fmt::layer().with_writer(writer).with_ansi(false).json())
                        .try_init()?;
                },
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Text);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_with_filter() {
        let config = LogConfig::default().with_filter("debug");
        assert_eq!(config.filter, "debug");
    }

    // The one test in this binary allowed to install the global
    // subscriber; it picks the JSON console + file stack, the layer
    // combination with the most involved type bounds.
    #[test]
    fn test_init_logging_json_with_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            format: LogFormat::Json,
            log_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        init_logging(&config).unwrap();
        tracing::info!(check = true, "logging initialized");
    }
}
