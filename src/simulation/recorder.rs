//! Batch recorder
//!
//! Walks the content tree for every selected student and course, synthesizes
//! an outcome per node and persists it: an activity record, its meta rows and
//! the matching aggregate state (course progress, lesson completions, quiz
//! history and completion markers). The whole walk and the ledger write share
//! one transaction, so a failing write leaves no trace of the call.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::RngCore;
use tracing::{debug, info, instrument};

use crate::content::{ContentHierarchyProvider, ContentNode, ContentTree};
use crate::simulation::ledger::{EntityOutcome, SimulationBatch, SimulationLedger, StudentActivity};
use crate::simulation::synthesizer::{synthesize, QuizOutcome, SynthesisWindow, SynthesizedOutcome};
use crate::store::{
    markers, run_in_transaction, CourseProgressMap, LessonCompletions, NewActivityRecord,
    QuizAttempt, SimulationStore, StorageError, StoreResult,
};
use crate::types::{ActivityParams, ContentId, RecordId, StudentId};

/// Persists synthesized activity for one generate call
pub struct BatchRecorder<'a, P: ContentHierarchyProvider + ?Sized> {
    provider: &'a P,
    ledger: &'a SimulationLedger,
    params: ActivityParams,
    now: DateTime<Utc>,
}

/// Aggregate state of one student while their activity is being written
struct StudentAggregates {
    progress: CourseProgressMap,
    completions: LessonCompletions,
    completions_changed: bool,
}

impl<P: ContentHierarchyProvider + ?Sized> fmt::Debug for BatchRecorder<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchRecorder")
            .field("ledger", self.ledger)
            .field("params", &self.params)
            .field("now", &self.now)
            .finish()
    }
}

impl<'a, P: ContentHierarchyProvider + ?Sized> BatchRecorder<'a, P> {
    /// Recorder generating activity in the window of `params.activity_days` days ending at `now`
    pub fn new(
        provider: &'a P,
        ledger: &'a SimulationLedger,
        params: ActivityParams,
        now: DateTime<Utc>,
    ) -> Self {
        Self { provider, ledger, params, now }
    }

    /// Generate and persist activity for every student across every course
    ///
    /// Students and courses are walked in ascending id order. On success the
    /// returned batch has already been saved to the ledger. On error every
    /// write of the call has been rolled back.
    #[instrument(skip(self, store, students, courses, rng), fields(students = students.len(), courses = courses.len()))]
    pub fn record<S: SimulationStore + ?Sized>(
        &self,
        store: &mut S,
        students: BTreeSet<StudentId>,
        courses: BTreeSet<ContentId>,
        rng: &mut dyn RngCore,
    ) -> StoreResult<SimulationBatch> {
        let tree = ContentTree::build(self.provider, &courses, &students);
        let window = SynthesisWindow::ending_at(self.now, self.params.activity_days);
        let mut batch = SimulationBatch::new(students, courses, self.params, self.now);

        info!(
            "Recording batch {} for {} students across {} courses",
            batch.batch_id,
            batch.students.len(),
            tree.course_count()
        );

        run_in_transaction(store, |tx| -> StoreResult<SimulationBatch> {
            for &student in &batch.students {
                let activity =
                    self.record_student(tx, &tree, student, &batch.courses, window, &mut *rng)?;
                debug!("Recorded {} records for {}", activity.record_ids.len(), student);
                batch.activity.insert(student, activity);
            }
            self.ledger.save(tx, &batch)?;
            Ok(batch)
        })
    }

    fn record_student<S: SimulationStore + ?Sized>(
        &self,
        store: &mut S,
        tree: &ContentTree,
        student: StudentId,
        courses: &BTreeSet<ContentId>,
        window: SynthesisWindow,
        rng: &mut dyn RngCore,
    ) -> StoreResult<StudentActivity> {
        let mut activity = StudentActivity::default();
        let mut aggregates = StudentAggregates {
            progress: store.course_progress(student)?,
            completions: store.lesson_completions(student)?,
            completions_changed: false,
        };

        for &course in courses {
            for node in tree.walk(course, student) {
                if let ContentNode::Quiz { parent: None, id, .. } = node {
                    if activity.has_quiz(id) {
                        debug!("Skipping course-level {} already taken by {}", id, student);
                        continue;
                    }
                }

                let outcome = synthesize(node.kind(), window, &self.params, rng);
                let record_id = self.persist_node(store, student, node, &outcome)?;
                activity.track_record(record_id);
                self.update_aggregates(store, student, node, &outcome, &mut aggregates)?;
                activity.record(node.kind(), node.id(), EntityOutcome::new(record_id, &outcome));
            }
        }

        store.replace_course_progress(student, aggregates.progress)?;
        if aggregates.completions_changed {
            store.replace_lesson_completions(student, aggregates.completions)?;
        }

        Ok(activity)
    }

    /// Insert the activity record and its meta rows
    fn persist_node<S: SimulationStore + ?Sized>(
        &self,
        store: &mut S,
        student: StudentId,
        node: ContentNode,
        outcome: &SynthesizedOutcome,
    ) -> StoreResult<RecordId> {
        let course_id = match node {
            ContentNode::Course { .. } => None,
            _ => Some(node.course()),
        };
        let record_id = store.insert_record(NewActivityRecord {
            student_id: student,
            content_id: node.id(),
            course_id,
            kind: node.kind(),
            started: outcome.started(),
            completed: outcome.completed(),
            status: outcome.status(),
        })?;

        match outcome {
            SynthesizedOutcome::Progress(progress) => {
                store.insert_meta(record_id, "steps_total", i64::from(progress.steps_total))?;
                store.insert_meta(record_id, "steps_completed", i64::from(progress.steps_completed))?;
            }
            SynthesizedOutcome::Quiz(quiz) => {
                store.insert_meta(record_id, "percentage", i64::from(quiz.percentage))?;
                store.insert_meta(record_id, "count", i64::from(quiz.total_questions))?;
                store.insert_meta(record_id, "score", i64::from(quiz.correct_count))?;
                store.insert_meta(record_id, "pass", i64::from(quiz.pass))?;
                store.insert_meta(record_id, "points", i64::from(quiz.points()))?;
                store.insert_meta(record_id, "total_points", i64::from(quiz.total_points()))?;
            }
        }

        Ok(record_id)
    }

    fn update_aggregates<S: SimulationStore + ?Sized>(
        &self,
        store: &mut S,
        student: StudentId,
        node: ContentNode,
        outcome: &SynthesizedOutcome,
        aggregates: &mut StudentAggregates,
    ) -> StoreResult<()> {
        let completed = outcome.status().is_completed();
        match (node, outcome) {
            (ContentNode::Course { id }, _) => {
                let entry = aggregates.progress.entry(id).or_default();
                if completed {
                    entry.completed = true;
                    store.set_marker(student, &markers::course_completed(id), self.now.timestamp())?;
                    if let Some(certificate) = self.provider.course_certificate(id) {
                        let key = markers::certificate_awarded(id);
                        let value = i64::try_from(certificate).map_err(|_| StorageError::WriteFailed {
                            target: key.clone(),
                            reason: format!("certificate id {} exceeds the marker value range", certificate),
                        })?;
                        store.set_marker(student, &key, value)?;
                    }
                }
            }
            (ContentNode::Lesson { course, id } | ContentNode::Topic { course, id, .. }, _)
                if completed =>
            {
                aggregates.completions.entry(course).or_default().insert(id, self.now);
                aggregates.completions_changed = true;
                store.set_marker(
                    student,
                    &markers::lesson_completed(course, id),
                    self.now.timestamp(),
                )?;
            }
            (ContentNode::Quiz { course, id, .. }, SynthesizedOutcome::Quiz(quiz)) => {
                store.append_quiz_attempt(student, self.quiz_attempt(course, id, quiz))?;
            }
            _ => {}
        }
        Ok(())
    }

    fn quiz_attempt(&self, course: ContentId, quiz: ContentId, outcome: &QuizOutcome) -> QuizAttempt {
        QuizAttempt {
            quiz,
            course,
            pro_quiz_id: self.provider.quiz_pro_id(quiz),
            score: outcome.correct_count,
            count: outcome.total_questions,
            pass: outcome.pass,
            rank: outcome.pass.into(),
            points: outcome.points(),
            total_points: outcome.total_points(),
            percentage: outcome.percentage,
            time_spent: outcome.time_spent(),
            has_graded: false,
            statistic_ref_id: 0,
            time: self.now,
            started: outcome.started,
            completed: outcome.completed,
        }
    }
}
