//! Activity simulation: synthesis, recording, export and cleanup
//!
//! This module contains everything between a generate request and the rows
//! it leaves in the store, plus the two operations that read the result back.
//!
//! # Overview
//!
//! - **synthesizer**: random outcomes for one content node
//! - **BatchRecorder**: walks the hierarchy and persists one batch in a single transaction
//! - **SimulationLedger**: the one stored manifest of what a batch created
//! - **ExportSerializer**: writes the manifest to a timestamped JSON file
//! - **CleanupExecutor**: deletes exactly what the manifest lists
//! - **ActivitySimulator**: facade owning store, provider and configuration
//! - **GenerationSummary**: operator-facing counts for a batch
//! - **SimulationError**: error type shared by all operations
//!
//! # Usage Example
//!
//! ```rust
//! use lms_activity_simulator::api::GenerateRequest;
//! use lms_activity_simulator::content::ContentCatalog;
//! use lms_activity_simulator::simulation::*;
//! use lms_activity_simulator::store::MemoryStore;
//! use lms_activity_simulator::types::*;
//!
//! let catalog = ContentCatalog::new()
//!     .with_course(ContentId(1))
//!     .with_lesson(ContentId(10))
//!     .with_quiz(ContentId(11));
//! let config = SimulationConfig { seed: Some(7), ..Default::default() };
//! let mut simulator = ActivitySimulator::new(MemoryStore::new(), catalog, config)?;
//!
//! let batch = simulator.generate(GenerateRequest::new([StudentId(4)], [ContentId(1)]))?;
//! assert_eq!(batch.record_count(), 3);
//!
//! let report = simulator.cleanup()?;
//! assert_eq!(report.deleted_activity, 3);
//! # Ok::<(), SimulationError>(())
//! ```

pub mod cleanup;
pub mod error;
pub mod export;
pub mod ledger;
pub mod logging;
pub mod recorder;
pub mod simulator;
pub mod statistics;
pub mod synthesizer;

// Re-export all public types for convenience
pub use cleanup::*;
pub use error::*;
pub use export::*;
pub use ledger::*;
pub use logging::*;
pub use recorder::*;
pub use simulator::*;
pub use statistics::*;
pub use synthesizer::*;
