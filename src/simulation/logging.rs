//! Logging and tracing configuration
//!
//! Centralized subscriber setup for the simulator binary. Console output
//! always goes to stderr so stdout stays reserved for response envelopes.
//! File output, when enabled, is JSON in daily rolling files.

use std::io;

use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::types::CliArgs;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for the application
    pub level: Level,
    /// Whether console output is JSON
    pub json_format: bool,
    /// Directory for rolling log files; no file output when `None`
    pub log_directory: Option<String>,
    /// Log file prefix
    pub log_file_prefix: String,
    /// Whether to log span open/close events
    pub enable_span_events: bool,
    /// Whether to use ANSI colors in console output
    pub enable_ansi: bool,
    /// Custom environment filter, overriding `level`
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            json_format: false,
            log_directory: None,
            log_file_prefix: "lms-activity-simulator".to_string(),
            enable_span_events: false,
            enable_ansi: true,
            env_filter: None,
        }
    }
}

/// Keeps background log writers flushing; drop it at the end of `main`
#[derive(Debug)]
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

impl LoggingConfig {
    /// Create a new logging configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration matching the command line flags
    ///
    /// `--debug` wins over `--verbose`; both turn on span events.
    pub fn from_cli_args(args: &CliArgs) -> Self {
        let mut config = if args.debug {
            Self::new().with_level(Level::DEBUG).with_span_events()
        } else if args.verbose {
            Self::new().with_level(Level::INFO).with_span_events()
        } else {
            Self::new()
        };
        if args.json_logs {
            config = config.with_json_format().without_ansi();
        }
        if let Some(dir) = &args.log_dir {
            config = config.with_file_logging(dir.clone());
        }
        config
    }

    /// Set the log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Enable JSON formatting on the console
    pub fn with_json_format(mut self) -> Self {
        self.json_format = true;
        self
    }

    /// Enable file logging into `directory`
    pub fn with_file_logging(mut self, directory: impl Into<String>) -> Self {
        self.log_directory = Some(directory.into());
        self
    }

    /// Set log file prefix
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_file_prefix = prefix.into();
        self
    }

    /// Enable span events
    pub fn with_span_events(mut self) -> Self {
        self.enable_span_events = true;
        self
    }

    /// Disable ANSI colors
    pub fn without_ansi(mut self) -> Self {
        self.enable_ansi = false;
        self
    }

    /// Set custom environment filter
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive used when neither `env_filter` nor `RUST_LOG` is set
    pub fn default_directive(&self) -> String {
        format!("{}={}", env!("CARGO_PKG_NAME").replace('-', "_"), self.level)
    }

    fn span_events(&self) -> FmtSpan {
        if self.enable_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Initialize the global tracing subscriber
    ///
    /// The returned guard must be kept alive for as long as logs should be
    /// written; dropping it flushes and stops the background writers.
    pub fn init(self) -> Result<LoggingGuard, Box<dyn std::error::Error + Send + Sync>> {
        let env_filter = match &self.env_filter {
            Some(filter) => EnvFilter::try_new(filter)?,
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.default_directive())),
        };

        let mut guards = Vec::new();
        let mut layers: Vec<BoxedLayer> = Vec::new();

        let (console_writer, console_guard) = non_blocking(io::stderr());
        guards.push(console_guard);
        let console = fmt::layer().with_writer(console_writer).with_span_events(self.span_events());
        layers.push(if self.json_format {
            console.json().boxed()
        } else {
            console.pretty().with_ansi(self.enable_ansi).boxed()
        });

        if let Some(dir) = &self.log_directory {
            let (file_writer, file_guard) =
                non_blocking(rolling::daily(dir, &self.log_file_prefix));
            guards.push(file_guard);
            layers.push(
                fmt::layer()
                    .json()
                    .with_writer(file_writer)
                    .with_span_events(self.span_events())
                    .boxed(),
            );
        }

        Registry::default().with(layers).with(env_filter).try_init()?;

        info!(
            level = %self.level,
            json = self.json_format,
            log_directory = ?self.log_directory,
            "Logging initialized"
        );
        Ok(LoggingGuard { _guards: guards })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_logging_config_creation() {
        let config = LoggingConfig::new();
        assert_eq!(config.level, Level::WARN);
        assert!(!config.json_format);
        assert!(config.log_directory.is_none());
        assert_eq!(config.log_file_prefix, "lms-activity-simulator");
        assert!(!config.enable_span_events);
        assert!(config.enable_ansi);
        assert!(config.env_filter.is_none());
    }

    #[test]
    fn test_logging_config_builder_pattern() {
        let config = LoggingConfig::new()
            .with_level(Level::DEBUG)
            .with_json_format()
            .with_file_logging("test_logs")
            .with_file_prefix("test_prefix")
            .with_span_events()
            .without_ansi()
            .with_env_filter("debug");

        assert_eq!(config.level, Level::DEBUG);
        assert!(config.json_format);
        assert_eq!(config.log_directory, Some("test_logs".to_string()));
        assert_eq!(config.log_file_prefix, "test_prefix");
        assert!(config.enable_span_events);
        assert!(!config.enable_ansi);
        assert_eq!(config.env_filter, Some("debug".to_string()));
    }

    #[test]
    fn test_default_directive() {
        let config = LoggingConfig::new().with_level(Level::INFO);
        assert_eq!(config.default_directive(), "lms_activity_simulator=INFO");
    }

    #[test]
    fn test_from_cli_args() {
        let args = CliArgs::parse_from(["lms-activity-simulator", "--verbose", "export"]);
        let config = LoggingConfig::from_cli_args(&args);
        assert_eq!(config.level, Level::INFO);
        assert!(config.enable_span_events);

        let args = CliArgs::parse_from([
            "lms-activity-simulator",
            "--verbose",
            "--debug",
            "--json-logs",
            "--log-dir",
            "logs",
            "cleanup",
        ]);
        let config = LoggingConfig::from_cli_args(&args);
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.json_format);
        assert!(!config.enable_ansi);
        assert_eq!(config.log_directory.as_deref(), Some("logs"));

        let args = CliArgs::parse_from(["lms-activity-simulator", "export"]);
        assert_eq!(LoggingConfig::from_cli_args(&args).level, Level::WARN);
    }
}
