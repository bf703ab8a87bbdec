//! Error types and handling
//!
//! This module contains the error type returned by every simulator operation.
//! Errors fall into a small set of [`ErrorKind`]s; input validation errors
//! are always raised before anything is written.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::StorageError;
use crate::types::{BatchId, ConfigValidationError};

/// Errors that can occur during simulation
#[derive(Debug, Error)]
pub enum SimulationError {
    /// No students were selected
    #[error("No students selected")]
    NoStudents,

    /// No courses were selected
    #[error("No courses selected")]
    NoCourses,

    /// A rate or window parameter is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] ConfigValidationError),

    /// A batch is already stored and overwriting is disabled
    #[error("Simulation batch {batch_id} from {created_at} still exists; run cleanup before generating again")]
    BatchAlreadyExists {
        /// Stored batch
        batch_id: BatchId,
        /// Creation time of the stored batch
        created_at: DateTime<Utc>,
    },

    /// Writing the generated activity failed; nothing was kept
    #[error("Activity generation failed: {0}")]
    GenerationFailed(#[source] StorageError),

    /// No batch is stored
    #[error("No simulation data found")]
    NoData,

    /// The export file could not be written
    #[error("Failed to write export file {path}: {source}")]
    ExportFailed {
        /// Target path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Deleting the simulated activity failed; nothing was deleted
    #[error("Cleanup failed: {0}")]
    CleanupFailed(#[source] StorageError),

    /// The ledger slot could not be read
    #[error("Simulation ledger unavailable: {0}")]
    LedgerUnavailable(#[source] StorageError),

    /// The ledger slot holds something that is not a batch
    #[error("Simulation ledger is corrupt: {0}")]
    LedgerCorrupt(#[source] serde_json::Error),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ConfigurationError(String),
}

/// Broad classification of simulation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected input; nothing was written
    InputValidation,
    /// A store operation failed and was rolled back
    PersistenceFailure,
    /// There is nothing to operate on
    EmptyState,
    /// A file could not be written
    IoFailure,
    /// The simulator is misconfigured
    Configuration,
}

impl SimulationError {
    /// Create a configuration error
    pub fn configuration_error(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create an export error for `path`
    pub fn export_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::ExportFailed { path: path.into(), source }
    }

    /// Classification of the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimulationError::NoStudents
            | SimulationError::NoCourses
            | SimulationError::InvalidParameter(_)
            | SimulationError::BatchAlreadyExists { .. } => ErrorKind::InputValidation,
            SimulationError::GenerationFailed(_)
            | SimulationError::CleanupFailed(_)
            | SimulationError::LedgerUnavailable(_)
            | SimulationError::LedgerCorrupt(_) => ErrorKind::PersistenceFailure,
            SimulationError::NoData => ErrorKind::EmptyState,
            SimulationError::ExportFailed { .. } => ErrorKind::IoFailure,
            SimulationError::ConfigurationError(_) => ErrorKind::Configuration,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            SimulationError::NoStudents => "no_students",
            SimulationError::NoCourses => "no_courses",
            SimulationError::InvalidParameter(_) => "invalid_parameter",
            SimulationError::BatchAlreadyExists { .. } => "batch_exists",
            SimulationError::GenerationFailed(_) => "generation_failed",
            SimulationError::NoData => "no_data",
            SimulationError::ExportFailed { .. } => "export_failed",
            SimulationError::CleanupFailed(_) => "cleanup_failed",
            SimulationError::LedgerUnavailable(_) => "ledger_unavailable",
            SimulationError::LedgerCorrupt(_) => "ledger_corrupt",
            SimulationError::ConfigurationError(_) => "configuration_error",
        }
    }

    /// Whether the error was raised before anything was written
    pub fn is_input_error(&self) -> bool {
        self.kind() == ErrorKind::InputValidation
    }

    /// Get the error category
    pub fn category(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InputValidation => "Input Validation",
            ErrorKind::PersistenceFailure => "Persistence",
            ErrorKind::EmptyState => "Empty State",
            ErrorKind::IoFailure => "IO",
            ErrorKind::Configuration => "Configuration",
        }
    }
}

/// Result type for simulation operations
pub type SimulationResult<T> = Result<T, SimulationError>;
