//! Log subscriber setup for the CLI

use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact single-line text
    Text,
    /// Multi-line human-readable output
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "rung=info,rung_migrate=info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.level = "rung=debug,rung_migrate=debug".to_string();
        }
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Install the global subscriber; `RUST_LOG` takes precedence over the config
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).json())
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).pretty())
            .try_init()?,
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).with_target(false))
            .try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_raises_level() {
        let config = LoggingConfig::default().verbose(true).format(LogFormat::Json);
        assert!(config.level.contains("rung_migrate=debug"));
        assert_eq!(config.format, LogFormat::Json);

        let config = LoggingConfig::default().verbose(false);
        assert_eq!(config.level, LoggingConfig::default().level);
    }

    #[test]
    fn test_pretty_format_is_selectable() {
        use clap::ValueEnum;

        let format = LogFormat::from_str("pretty", true).unwrap();
        assert_eq!(format, LogFormat::Pretty);

        let config = LoggingConfig::default().format(format);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.level, LoggingConfig::default().level);
    }
}
