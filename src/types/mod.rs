//! Core types and identifiers for the activity simulator
//!
//! This module contains fundamental types, identifiers, and configuration structures
//! used throughout the simulation system.
//!
//! # Overview
//!
//! - **Identifiers**: numeric ids for students, content and records, UUID ids for batches
//! - **Enums**: content kinds, activity statuses, quiz ranks and store tables
//! - **Configuration**: simulation configuration with validation and CLI support
//!
//! # Usage Example
//!
//! ```rust
//! use lms_activity_simulator::types::*;
//!
//! let student = StudentId(4);
//! let course = ContentId(120);
//! assert_eq!(student.to_string(), "student#4");
//! assert_eq!(course.to_string(), "content#120");
//!
//! let config = SimulationConfig { completion_rate: 50, ..Default::default() };
//! assert!(config.validate().is_ok());
//! assert_eq!(config.activity_params().quiz_pass_rate, 75);
//! ```

pub mod config;
pub mod enums;
pub mod identifiers;

// Re-export all public types for convenience
pub use config::*;
pub use enums::*;
pub use identifiers::*;
