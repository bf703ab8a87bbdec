//! Configuration structures for the activity simulator
//!
//! This module contains the simulation configuration, the activity rate
//! parameters and the command line interface used to drive the simulator.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::{ContentId, StudentId};

/// Default values shared by the configuration, the CLI and request parsing
pub mod defaults {
    /// Length of the simulated activity window in days
    pub const ACTIVITY_DAYS: u32 = 30;

    /// Percentage of courses, lessons and topics that get completed
    pub const COMPLETION_RATE: u8 = 80;

    /// Minimum quiz percentage counted as a pass
    pub const QUIZ_PASS_RATE: u8 = 75;

    /// Longest supported activity window in days
    pub const MAX_ACTIVITY_DAYS: u32 = 365;

    /// Directory receiving export files
    pub const EXPORT_DIR: &str = "activity-exports";

    /// State file used by the command line binary
    pub const STATE_FILE: &str = "simulator-state.json";
}

/// Rate parameters controlling one generate call
///
/// Missing fields deserialize to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityParams {
    /// Length of the activity window ending now, in days
    pub activity_days: u32,
    /// Completion probability for courses, lessons and topics (0-100)
    pub completion_rate: u8,
    /// Pass threshold for quiz percentages (0-100)
    pub quiz_pass_rate: u8,
}

impl Default for ActivityParams {
    fn default() -> Self {
        Self {
            activity_days: defaults::ACTIVITY_DAYS,
            completion_rate: defaults::COMPLETION_RATE,
            quiz_pass_rate: defaults::QUIZ_PASS_RATE,
        }
    }
}

impl ActivityParams {
    /// Validate the parameter ranges
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.activity_days == 0 || self.activity_days > defaults::MAX_ACTIVITY_DAYS {
            return Err(ConfigValidationError::InvalidActivityDays(self.activity_days));
        }
        validate_rate("completion_rate", self.completion_rate)?;
        validate_rate("quiz_pass_rate", self.quiz_pass_rate)?;
        Ok(())
    }
}

fn validate_rate(field: &str, value: u8) -> Result<(), ConfigValidationError> {
    if value > 100 {
        return Err(ConfigValidationError::InvalidRate { field: field.to_string(), value });
    }
    Ok(())
}

/// Command line arguments structure
#[derive(Debug, Clone, Parser)]
#[command(
    name = "lms-activity-simulator",
    version,
    about = "LMS Activity Simulator - generates, exports and reverts synthetic learner activity",
    long_about = "Generates plausible learner activity (course, lesson, topic and quiz records) for a set of students, records everything it created in a single ledger, and can export that ledger or delete every record it created.

EXAMPLES:
    # Generate activity for two students across one course
    lms-activity-simulator --catalog catalog.json generate --students 4,7 --courses 120

    # Generate across every course in the catalog with a fixed seed
    lms-activity-simulator --catalog catalog.json --seed 42 generate --students 4 --all-courses

    # Export the current ledger
    lms-activity-simulator export

    # Remove everything the last generate call created
    lms-activity-simulator cleanup

CONFIGURATION:
    1. Command line arguments (highest priority)
    2. Configuration file (--config flag, JSON)
    3. Default values (lowest priority)

    Use --print-config to generate a template configuration file."
)]
pub struct CliArgs {
    /// Configuration file path (JSON format)
    #[arg(short, long, help = "Configuration file path (JSON format)")]
    pub config: Option<String>,

    /// State file holding activity records, aggregate state and the ledger
    #[arg(
        long,
        default_value = defaults::STATE_FILE,
        help = "State file holding the simulated store (JSON)"
    )]
    pub state: String,

    /// Content catalog describing the course hierarchy
    #[arg(long, help = "Content catalog file (JSON)")]
    pub catalog: Option<String>,

    /// Random seed for reproducible results
    #[arg(long, help = "Random seed for reproducible results")]
    pub seed: Option<u64>,

    /// Directory receiving export files
    #[arg(long, help = "Directory receiving export files")]
    pub export_dir: Option<String>,

    /// Base URL under which export files are published
    #[arg(long, help = "Base URL under which export files are published")]
    pub export_base_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, help = "Enable debug logging")]
    pub debug: bool,

    /// Emit logs as JSON
    #[arg(long, help = "Emit logs as JSON instead of pretty text")]
    pub json_logs: bool,

    /// Also write logs to daily rolling files in this directory
    #[arg(long, help = "Also write logs to daily rolling files in this directory")]
    pub log_dir: Option<String>,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in JSON format and exit")]
    pub print_config: bool,

    /// Operation to run
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Operations exposed by the command line binary
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Generate activity for the selected students and courses
    Generate(GenerateArgs),
    /// Export the current ledger to a timestamped JSON file
    Export,
    /// Delete every record created by the last generate call
    Cleanup,
}

/// Arguments of the generate operation
#[derive(Debug, Clone, Default, clap::Args)]
pub struct GenerateArgs {
    /// Student ids to simulate
    #[arg(long, value_delimiter = ',', help = "Comma separated student ids")]
    pub students: Vec<StudentId>,

    /// Course ids to simulate
    #[arg(long, value_delimiter = ',', help = "Comma separated course ids")]
    pub courses: Vec<ContentId>,

    /// Use every course listed by the content catalog
    #[arg(long, conflicts_with = "courses", help = "Simulate every course in the catalog")]
    pub all_courses: bool,

    /// Length of the activity window in days
    #[arg(long, help = "Activity window in days (1-365)")]
    pub activity_days: Option<u32>,

    /// Completion rate for courses, lessons and topics
    #[arg(long, help = "Completion rate percentage (0-100)")]
    pub completion_rate: Option<u8>,

    /// Quiz pass threshold
    #[arg(long, help = "Quiz pass rate percentage (0-100)")]
    pub quiz_pass_rate: Option<u8>,

    /// Replace an existing simulation batch instead of refusing to run
    #[arg(long, help = "Replace an existing simulation batch")]
    pub force: bool,
}

/// Configuration file structure (allows partial configuration)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Length of the activity window in days
    pub activity_days: Option<u32>,
    /// Completion rate for courses, lessons and topics (0-100)
    pub completion_rate: Option<u8>,
    /// Quiz pass threshold (0-100)
    pub quiz_pass_rate: Option<u8>,
    /// Random seed for reproducible results
    pub seed: Option<u64>,
    /// Directory receiving export files
    pub export_dir: Option<String>,
    /// Base URL under which export files are published
    pub export_base_url: Option<String>,
    /// Replace an existing batch on generate
    pub overwrite_existing_batch: Option<bool>,
}

/// Configuration for the activity simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Length of the activity window in days
    pub activity_days: u32,

    /// Completion rate for courses, lessons and topics (0-100)
    pub completion_rate: u8,

    /// Quiz pass threshold (0-100)
    pub quiz_pass_rate: u8,

    /// Random seed for reproducible results
    pub seed: Option<u64>,

    /// Directory receiving export files
    pub export_dir: String,

    /// Base URL under which export files are published
    pub export_base_url: Option<String>,

    /// Replace an existing batch on generate instead of failing
    pub overwrite_existing_batch: bool,
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Configuration file read error
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// JSON parsing error
    #[error("Failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Unsupported configuration file format
    #[error("Unsupported configuration file format: {0} (supported: .json)")]
    UnsupportedFormat(String),
}

/// Validation errors for simulation configuration
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigValidationError {
    /// Activity window is out of range
    #[error("Activity days must be between 1 and 365, got {0}")]
    InvalidActivityDays(u32),

    /// Rate value is out of range
    #[error("Invalid rate for {field}: {value} (must be between 0 and 100)")]
    InvalidRate {
        /// Name of the field with the invalid rate
        field: String,
        /// The invalid rate value
        value: u8,
    },

    /// Export directory is empty
    #[error("Export directory must not be empty")]
    EmptyExportDir,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            activity_days: defaults::ACTIVITY_DAYS,
            completion_rate: defaults::COMPLETION_RATE,
            quiz_pass_rate: defaults::QUIZ_PASS_RATE,
            seed: None,
            export_dir: defaults::EXPORT_DIR.to_string(),
            export_base_url: None,
            overwrite_existing_batch: false,
        }
    }
}

impl SimulationConfig {
    /// Create configuration from parsed CLI arguments and the optional config file
    pub fn from_cli_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        Self::apply_cli_overrides(&mut config, args);
        Ok(config)
    }

    /// Load configuration from a JSON file, merging with defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {
                let content = fs::read_to_string(path)?;
                let config_file: ConfigFile = serde_json::from_str(&content)?;
                Ok(Self::from_config_file(config_file))
            }
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::UnsupportedFormat("no extension".to_string())),
        }
    }

    fn from_config_file(config_file: ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            activity_days: config_file.activity_days.unwrap_or(defaults.activity_days),
            completion_rate: config_file.completion_rate.unwrap_or(defaults.completion_rate),
            quiz_pass_rate: config_file.quiz_pass_rate.unwrap_or(defaults.quiz_pass_rate),
            seed: config_file.seed.or(defaults.seed),
            export_dir: config_file.export_dir.unwrap_or(defaults.export_dir),
            export_base_url: config_file.export_base_url.or(defaults.export_base_url),
            overwrite_existing_batch: config_file
                .overwrite_existing_batch
                .unwrap_or(defaults.overwrite_existing_batch),
        }
    }

    fn apply_cli_overrides(config: &mut Self, args: &CliArgs) {
        if let Some(value) = args.seed {
            config.seed = Some(value);
        }
        if let Some(value) = &args.export_dir {
            config.export_dir = value.clone();
        }
        if let Some(value) = &args.export_base_url {
            config.export_base_url = Some(value.clone());
        }

        if let Some(Command::Generate(generate)) = &args.command {
            if let Some(value) = generate.activity_days {
                config.activity_days = value;
            }
            if let Some(value) = generate.completion_rate {
                config.completion_rate = value;
            }
            if let Some(value) = generate.quiz_pass_rate {
                config.quiz_pass_rate = value;
            }
            if generate.force {
                config.overwrite_existing_batch = true;
            }
        }
    }

    /// Print configuration as JSON
    pub fn print_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rate parameters for generate calls
    pub fn activity_params(&self) -> ActivityParams {
        ActivityParams {
            activity_days: self.activity_days,
            completion_rate: self.completion_rate,
            quiz_pass_rate: self.quiz_pass_rate,
        }
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.activity_params().validate()?;

        if self.export_dir.trim().is_empty() {
            return Err(ConfigValidationError::EmptyExportDir);
        }

        Ok(())
    }
}
