//! Storage traits for the simulator's collaborators.
//!
//! The simulator never talks to a concrete database. It writes activity rows
//! through [`ActivityStore`], derived per-student summaries through
//! [`AggregateStateStore`] and its ledger through [`LedgerSlot`]. Every
//! mutating operation runs inside a transaction opened through
//! [`Transactional`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::records::{CourseProgress, NewActivityRecord, QuizAttempt};
use crate::types::{ActivityTable, ContentId, RecordId, StudentId};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write was rejected by the backend.
    #[error("Write to {target} failed: {reason}")]
    WriteFailed {
        /// Table or key that was being written.
        target: String,
        /// Backend supplied reason.
        reason: String,
    },

    /// Transaction misuse (nested begin, commit without begin, ...).
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// I/O error while loading or persisting the backend.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StorageError>;

/// Lesson completion map of one student: course -> lesson/topic -> completion time.
pub type LessonCompletions = BTreeMap<ContentId, BTreeMap<ContentId, DateTime<Utc>>>;

/// Course progress map of one student.
pub type CourseProgressMap = BTreeMap<ContentId, CourseProgress>;

/// Raw activity rows: records plus their key/value meta.
pub trait ActivityStore {
    /// Insert a new activity record and return the id assigned to it.
    fn insert_record(&mut self, record: NewActivityRecord) -> StoreResult<RecordId>;

    /// Attach a meta value to an existing record.
    fn insert_meta(&mut self, record_id: RecordId, key: &str, value: i64) -> StoreResult<()>;

    /// Delete every row of `table` that belongs to one of `ids`.
    ///
    /// Returns the number of rows removed. Ids without rows are ignored.
    fn bulk_delete(&mut self, table: ActivityTable, ids: &[RecordId]) -> StoreResult<usize>;
}

/// Derived per-student summaries maintained alongside the raw activity rows.
///
/// All writes replace or append whole values; there is no partial merge.
pub trait AggregateStateStore {
    /// Course progress map of a student (empty when never written).
    fn course_progress(&self, student: StudentId) -> StoreResult<CourseProgressMap>;

    /// Replace the whole course progress map of a student.
    fn replace_course_progress(
        &mut self,
        student: StudentId,
        progress: CourseProgressMap,
    ) -> StoreResult<()>;

    /// Delete the course progress map. Returns whether one existed.
    fn delete_course_progress(&mut self, student: StudentId) -> StoreResult<bool>;

    /// Lesson completion map of a student (empty when never written).
    fn lesson_completions(&self, student: StudentId) -> StoreResult<LessonCompletions>;

    /// Replace the whole lesson completion map of a student.
    fn replace_lesson_completions(
        &mut self,
        student: StudentId,
        completions: LessonCompletions,
    ) -> StoreResult<()>;

    /// Delete the lesson completion map. Returns whether one existed.
    fn delete_lesson_completions(&mut self, student: StudentId) -> StoreResult<bool>;

    /// Quiz history of a student, oldest first.
    fn quiz_history(&self, student: StudentId) -> StoreResult<Vec<QuizAttempt>>;

    /// Append one attempt to the quiz history.
    fn append_quiz_attempt(&mut self, student: StudentId, attempt: QuizAttempt) -> StoreResult<()>;

    /// Replace the whole quiz history.
    fn replace_quiz_history(
        &mut self,
        student: StudentId,
        history: Vec<QuizAttempt>,
    ) -> StoreResult<()>;

    /// Set a per-student marker value.
    fn set_marker(&mut self, student: StudentId, key: &str, value: i64) -> StoreResult<()>;

    /// Value of a per-student marker.
    fn marker(&self, student: StudentId, key: &str) -> StoreResult<Option<i64>>;

    /// Delete every marker of a student whose key satisfies `matches`.
    ///
    /// Returns the number of markers removed.
    fn delete_markers(
        &mut self,
        student: StudentId,
        matches: &dyn Fn(&str) -> bool,
    ) -> StoreResult<usize>;
}

/// Named durable slots holding serialized values.
pub trait LedgerSlot {
    /// Read a slot, `None` when it was never written or was deleted.
    fn read_slot(&self, name: &str) -> StoreResult<Option<String>>;

    /// Write a slot, replacing any previous value.
    fn write_slot(&mut self, name: &str, value: String) -> StoreResult<()>;

    /// Delete a slot. Returns whether it existed.
    fn delete_slot(&mut self, name: &str) -> StoreResult<bool>;
}

/// Scoped transactions over every store the simulator writes to.
///
/// Prefer [`crate::store::Transaction`] or [`crate::store::run_in_transaction`]
/// over calling these directly; both roll back whenever the work does not
/// finish successfully.
pub trait Transactional {
    /// Open a transaction.
    fn begin(&mut self) -> StoreResult<()>;

    /// Make every write since `begin` durable.
    fn commit(&mut self) -> StoreResult<()>;

    /// Discard every write since `begin`.
    fn rollback(&mut self) -> StoreResult<()>;
}

/// Everything the simulator needs from one backend.
pub trait SimulationStore: ActivityStore + AggregateStateStore + LedgerSlot + Transactional {}

impl<T> SimulationStore for T where T: ActivityStore + AggregateStateStore + LedgerSlot + Transactional {}
