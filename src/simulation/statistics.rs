//! Statistics collection and reporting
//!
//! This module summarizes a recorded batch for operators: how many records
//! were written and how the synthesized outcomes are distributed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::simulation::ledger::SimulationBatch;
use crate::types::{BatchId, ContentKind};

/// Counts of one content kind across a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTally {
    /// Nodes recorded
    pub recorded: usize,
    /// Nodes completed
    pub completed: usize,
}

impl KindTally {
    /// Share of recorded nodes that were completed, as a percentage
    pub fn completion_percentage(&self) -> f64 {
        if self.recorded == 0 {
            0.0
        } else {
            (self.completed as f64 / self.recorded as f64) * 100.0
        }
    }
}

/// Summary of a recorded batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Batch the summary describes
    pub batch_id: BatchId,
    /// Students simulated
    pub students: usize,
    /// Courses simulated
    pub courses: usize,
    /// Activity records written
    pub total_records: usize,
    /// Course tally
    pub course_tally: KindTally,
    /// Lesson tally
    pub lesson_tally: KindTally,
    /// Topic tally
    pub topic_tally: KindTally,
    /// Quizzes recorded
    pub quizzes_taken: usize,
    /// Quizzes passed
    pub quizzes_passed: usize,
    /// Mean quiz percentage, 0 when no quiz was taken
    pub average_quiz_percentage: f64,
}

impl GenerationSummary {
    /// Summarize `batch`
    pub fn from_batch(batch: &SimulationBatch) -> Self {
        let tally = |kind: ContentKind| {
            batch.activity.values().fold(KindTally::default(), |mut acc, activity| {
                acc.recorded += activity.outcomes(kind).len();
                acc.completed += activity.completed_count(kind);
                acc
            })
        };

        let scores: Vec<_> = batch
            .activity
            .values()
            .flat_map(|a| a.quizzes.values().filter_map(|o| o.quiz))
            .collect();
        let average_quiz_percentage = if scores.is_empty() {
            0.0
        } else {
            scores.iter().map(|s| f64::from(s.percentage)).sum::<f64>() / scores.len() as f64
        };

        Self {
            batch_id: batch.batch_id,
            students: batch.students.len(),
            courses: batch.courses.len(),
            total_records: batch.record_count(),
            course_tally: tally(ContentKind::Course),
            lesson_tally: tally(ContentKind::Lesson),
            topic_tally: tally(ContentKind::Topic),
            quizzes_taken: scores.len(),
            quizzes_passed: scores.iter().filter(|s| s.pass).count(),
            average_quiz_percentage,
        }
    }

    /// Share of quizzes passed, as a percentage
    pub fn quiz_pass_percentage(&self) -> f64 {
        if self.quizzes_taken == 0 {
            0.0
        } else {
            (self.quizzes_passed as f64 / self.quizzes_taken as f64) * 100.0
        }
    }

    /// Generate a multi-line report
    pub fn generate_summary_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Activity Generation Summary ===\n\n");
        report.push_str(&format!("Batch: {}\n", self.batch_id));
        report.push_str(&format!("Students: {}\n", self.students));
        report.push_str(&format!("Courses: {}\n", self.courses));
        report.push_str(&format!("Records Written: {}\n\n", self.total_records));

        report.push_str("Completion:\n");
        for (label, tally) in [
            ("Courses", self.course_tally),
            ("Lessons", self.lesson_tally),
            ("Topics", self.topic_tally),
        ] {
            report.push_str(&format!(
                "  - {}: {}/{} ({:.1}%)\n",
                label,
                tally.completed,
                tally.recorded,
                tally.completion_percentage()
            ));
        }

        report.push_str("\nQuizzes:\n");
        report.push_str(&format!(
            "  - Taken: {}, Passed: {} ({:.1}%)\n",
            self.quizzes_taken,
            self.quizzes_passed,
            self.quiz_pass_percentage()
        ));
        report.push_str(&format!("  - Average Score: {:.1}%\n", self.average_quiz_percentage));

        report
    }
}

impl fmt::Display for GenerationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.generate_summary_report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::ledger::{EntityOutcome, QuizScore, StudentActivity};
    use crate::types::{ActivityParams, ActivityStatus, ContentId, RecordId, StudentId};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    fn outcome(id: u64, completed: bool, quiz: Option<QuizScore>) -> EntityOutcome {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        EntityOutcome {
            record_id: RecordId(id),
            started: at,
            completed: completed.then_some(at),
            status: if completed { ActivityStatus::Completed } else { ActivityStatus::NotStarted },
            quiz,
        }
    }

    fn score(percentage: u8, pass: bool) -> QuizScore {
        QuizScore { percentage, correct_count: 0, total_questions: 5, pass }
    }

    #[test]
    fn test_summary_counts() {
        let mut batch = SimulationBatch::new(
            BTreeSet::from([StudentId(1), StudentId(2)]),
            BTreeSet::from([ContentId(5)]),
            ActivityParams::default(),
            Utc::now(),
        );

        let mut first = StudentActivity::default();
        first.record(ContentKind::Course, ContentId(5), outcome(1, true, None));
        first.record(ContentKind::Lesson, ContentId(6), outcome(2, false, None));
        first.record(ContentKind::Quiz, ContentId(7), outcome(3, true, Some(score(90, true))));
        first.record_ids = vec![RecordId(1), RecordId(2), RecordId(3)];

        let mut second = StudentActivity::default();
        second.record(ContentKind::Course, ContentId(5), outcome(4, false, None));
        second.record(ContentKind::Quiz, ContentId(7), outcome(5, true, Some(score(40, false))));
        second.record_ids = vec![RecordId(4), RecordId(5)];

        batch.activity.insert(StudentId(1), first);
        batch.activity.insert(StudentId(2), second);

        let summary = GenerationSummary::from_batch(&batch);
        assert_eq!(summary.students, 2);
        assert_eq!(summary.courses, 1);
        assert_eq!(summary.total_records, 5);
        assert_eq!(summary.course_tally, KindTally { recorded: 2, completed: 1 });
        assert_eq!(summary.lesson_tally, KindTally { recorded: 1, completed: 0 });
        assert_eq!(summary.topic_tally, KindTally::default());
        assert_eq!(summary.quizzes_taken, 2);
        assert_eq!(summary.quizzes_passed, 1);
        assert!((summary.average_quiz_percentage - 65.0).abs() < f64::EPSILON);
        assert!((summary.quiz_pass_percentage() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_batch_summary() {
        let batch = SimulationBatch::new(
            BTreeSet::new(),
            BTreeSet::new(),
            ActivityParams::default(),
            Utc::now(),
        );
        let summary = GenerationSummary::from_batch(&batch);
        assert_eq!(summary.total_records, 0);
        assert_eq!(summary.average_quiz_percentage, 0.0);
        assert_eq!(summary.quiz_pass_percentage(), 0.0);
        assert_eq!(summary.course_tally.completion_percentage(), 0.0);
    }

    #[test]
    fn test_report_display() {
        let batch = SimulationBatch::new(
            BTreeSet::from([StudentId(1)]),
            BTreeSet::from([ContentId(5)]),
            ActivityParams::default(),
            Utc::now(),
        );
        let report = GenerationSummary::from_batch(&batch).to_string();
        assert!(report.contains("Activity Generation Summary"));
        assert!(report.contains("Students: 1"));
        assert!(report.contains("Courses: 0/0"));
    }
}
