//! LMS Activity Simulator
//!
//! Generates plausible synthetic learner activity across a course hierarchy,
//! records everything it created in a single reversible ledger, and can later
//! export that ledger or delete every record it created.
//!
//! # Overview
//!
//! Given a set of students and a content hierarchy (course → lesson → topic →
//! quiz), the simulator produces randomized start and completion times,
//! quiz scores and pass/fail results, persists them as activity records with
//! their meta rows and per-student aggregate state, and keeps a manifest of
//! every id it wrote. The manifest is the only authority cleanup uses.
//!
//! ## Key Features
//!
//! - **Constrained randomness**: completion and pass rates, activity window, seedable RNG
//! - **Hierarchy traversal**: courses, lessons, topics and quizzes in a stable order
//! - **Atomic persistence**: one transaction per generate and per cleanup
//! - **Exact reversibility**: cleanup deletes precisely the recorded ids
//!
//! ## Quick Start
//!
//! ```rust
//! use lms_activity_simulator::*;
//!
//! let catalog = ContentCatalog::new()
//!     .with_course(ContentId(1))
//!     .with_lesson(ContentId(10))
//!     .with_topic(ContentId(11));
//! let config = SimulationConfig { seed: Some(42), ..Default::default() };
//! let mut simulator = ActivitySimulator::new(MemoryStore::new(), catalog, config)?;
//!
//! let request = simulator.request([StudentId(4), StudentId(7)], [ContentId(1)]);
//! let envelope = simulator.handle_generate(request);
//! assert!(envelope.is_success());
//!
//! let summary = GenerationSummary::from_batch(envelope.data().unwrap());
//! assert_eq!(summary.total_records, 6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`types`]: identifiers, enums and configuration
//! - [`content`]: content hierarchy provider trait and the JSON catalog
//! - [`store`]: storage traits, transactions and the in-memory backend
//! - [`simulation`]: synthesis, recording, ledger, export and cleanup
//! - [`api`]: request and response envelopes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │   Content   │    │  Recorder   │    │   Ledger    │
//! │             │───►│             │───►│             │
//! │ Hierarchy   │    │ Synthesizer │    │ Slot (JSON) │
//! └─────────────┘    └─────────────┘    └─────────────┘
//!                            │                 │
//!                            ▼                 ▼
//!                    ┌─────────────┐    ┌─────────────┐
//!                    │    Store    │◄───┤   Export /  │
//!                    │ Records     │    │   Cleanup   │
//!                    │ Aggregates  │    │             │
//!                    └─────────────┘    └─────────────┘
//! ```
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

// Module declarations
pub mod api;
pub mod content;
pub mod simulation;
pub mod store;
pub mod types;

// Core types and identifiers
pub use types::{
    ActivityParams, ActivityStatus, ConfigValidationError, ContentId, ContentKind, RecordId,
    SimulationConfig, StudentId,
};

// Content hierarchy
pub use content::{ContentCatalog, ContentHierarchyProvider, ContentNode, ContentTree};

// Storage
pub use store::{MemoryStore, SimulationStore, StorageError};

// Simulation operations
pub use simulation::{
    ActivitySimulator, CleanupReport, ExportReceipt, GenerationSummary, SimulationBatch,
    SimulationError, SimulationLedger,
};

// Request triad
pub use api::{GenerateRequest, ResponseEnvelope};
