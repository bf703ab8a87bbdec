//! Course content hierarchy
//!
//! This module describes the course → lesson → topic → quiz tree the
//! simulator walks.
//!
//! # Overview
//!
//! - **ContentHierarchyProvider**: Trait the host platform implements to expose its content
//! - **ContentTree**: Adjacency fetched once per generate call
//! - **ContentCatalog**: JSON-backed provider used by the binary and the tests
//!
//! # Usage Example
//!
//! ```rust
//! use lms_activity_simulator::content::*;
//! use lms_activity_simulator::types::{ContentId, StudentId};
//! use std::collections::BTreeSet;
//!
//! let catalog = ContentCatalog::new()
//!     .with_course(ContentId(1))
//!     .with_lesson(ContentId(10))
//!     .with_topic(ContentId(11));
//!
//! let tree = ContentTree::build(
//!     &catalog,
//!     &BTreeSet::from([ContentId(1)]),
//!     &BTreeSet::from([StudentId(7)]),
//! );
//! assert_eq!(tree.walk(ContentId(1), StudentId(7)).len(), 3);
//! ```

pub mod catalog;
pub mod hierarchy;

pub use catalog::*;
pub use hierarchy::*;
