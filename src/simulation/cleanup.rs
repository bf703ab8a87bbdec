//! Cleanup of simulated activity
//!
//! Deletes everything the stored batch created and then the ledger itself,
//! all inside one transaction. Record and meta rows are deleted strictly by
//! the ids in the ledger. Aggregate state cannot be split into simulated and
//! genuine parts, so it is handled per key:
//!
//! - course progress and lesson completions are deleted outright
//! - quiz history loses every attempt at a quiz the batch recorded
//! - completion markers are deleted by prefix
//!
//! Deleting whole keys also removes progress the student had in courses the
//! batch never touched; a warning is logged whenever that happens.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::simulation::error::{SimulationError, SimulationResult};
use crate::simulation::ledger::{SimulationBatch, SimulationLedger, StudentActivity};
use crate::store::{markers, run_in_transaction, SimulationStore, StoreResult};
use crate::types::{ActivityTable, BatchId, ContentId, StudentId};

/// What a cleanup deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Human readable confirmation
    pub message: String,
    /// Batch that was removed
    pub batch_id: BatchId,
    /// Activity records deleted
    pub deleted_activity: usize,
    /// Meta rows deleted
    pub deleted_meta: usize,
    /// Completion markers deleted
    pub deleted_markers: usize,
    /// Quiz history entries removed
    pub pruned_quiz_attempts: usize,
    /// Students whose data was cleaned
    pub students: usize,
}

#[derive(Debug, Default)]
struct StudentCleanup {
    deleted_activity: usize,
    deleted_meta: usize,
    deleted_markers: usize,
    pruned_quiz_attempts: usize,
}

/// Reverts the stored batch
#[derive(Debug, Clone, Copy)]
pub struct CleanupExecutor<'a> {
    ledger: &'a SimulationLedger,
}

impl<'a> CleanupExecutor<'a> {
    /// Executor for the batch stored in `ledger`
    pub fn new(ledger: &'a SimulationLedger) -> Self {
        Self { ledger }
    }

    /// Delete everything the stored batch created, then the batch itself
    ///
    /// Fails with [`SimulationError::NoData`] when no batch is stored and
    /// with [`SimulationError::CleanupFailed`] when any deletion fails, in
    /// which case nothing was deleted.
    #[instrument(skip_all)]
    pub fn cleanup<S: SimulationStore + ?Sized>(&self, store: &mut S) -> SimulationResult<CleanupReport> {
        let batch = self.ledger.load(store)?.ok_or(SimulationError::NoData)?;
        info!(
            "Cleaning up batch {} ({} students, {} records)",
            batch.batch_id,
            batch.activity.len(),
            batch.record_count()
        );

        let report = run_in_transaction(store, |tx| -> StoreResult<CleanupReport> {
            let mut report = CleanupReport {
                message: "Activity data cleaned up successfully".to_string(),
                batch_id: batch.batch_id,
                deleted_activity: 0,
                deleted_meta: 0,
                deleted_markers: 0,
                pruned_quiz_attempts: 0,
                students: 0,
            };

            for (&student, activity) in &batch.activity {
                let cleaned = clean_student(tx, &batch, student, activity)?;
                report.deleted_activity += cleaned.deleted_activity;
                report.deleted_meta += cleaned.deleted_meta;
                report.deleted_markers += cleaned.deleted_markers;
                report.pruned_quiz_attempts += cleaned.pruned_quiz_attempts;
                report.students += 1;
            }

            self.ledger.clear(tx)?;
            Ok(report)
        })
        .map_err(SimulationError::CleanupFailed)?;

        if report.deleted_activity != batch.record_count() {
            warn!(
                "Ledger listed {} records but {} were deleted",
                batch.record_count(),
                report.deleted_activity
            );
        }
        info!(
            "Cleanup removed {} records and {} meta rows for {} students",
            report.deleted_activity, report.deleted_meta, report.students
        );
        Ok(report)
    }
}

fn clean_student<S: SimulationStore + ?Sized>(
    store: &mut S,
    batch: &SimulationBatch,
    student: StudentId,
    activity: &StudentActivity,
) -> StoreResult<StudentCleanup> {
    let mut cleaned = StudentCleanup::default();

    if !activity.record_ids.is_empty() {
        cleaned.deleted_meta = store.bulk_delete(ActivityTable::Meta, &activity.record_ids)?;
        cleaned.deleted_activity = store.bulk_delete(ActivityTable::Records, &activity.record_ids)?;
    }

    let foreign_progress = foreign_courses(store.course_progress(student)?.keys(), &batch.courses);
    let foreign_completions = foreign_courses(store.lesson_completions(student)?.keys(), &batch.courses);
    if !foreign_progress.is_empty() || !foreign_completions.is_empty() {
        warn!(
            "Deleting progress of {} for courses outside the batch: {:?}",
            student,
            foreign_progress.union(&foreign_completions).collect::<Vec<_>>()
        );
    }
    store.delete_course_progress(student)?;
    store.delete_lesson_completions(student)?;

    let mut history = store.quiz_history(student)?;
    let before = history.len();
    history.retain(|attempt| !activity.has_quiz(attempt.quiz));
    cleaned.pruned_quiz_attempts = before - history.len();
    if cleaned.pruned_quiz_attempts > 0 {
        store.replace_quiz_history(student, history)?;
    }

    cleaned.deleted_markers = store.delete_markers(student, &markers::is_completion_marker)?;

    debug!(
        "Cleaned {}: {} records, {} meta rows, {} markers, {} quiz attempts",
        student,
        cleaned.deleted_activity,
        cleaned.deleted_meta,
        cleaned.deleted_markers,
        cleaned.pruned_quiz_attempts
    );
    Ok(cleaned)
}

fn foreign_courses<'a>(
    courses: impl Iterator<Item = &'a ContentId>,
    batch_courses: &BTreeSet<ContentId>,
) -> BTreeSet<ContentId> {
    courses.filter(|c| !batch_courses.contains(c)).copied().collect()
}
