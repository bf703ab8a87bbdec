//! Rows and aggregate values persisted by the stores
//!
//! Activity records and their meta rows live in the activity store. Course
//! progress, lesson completions, quiz history and legacy completion markers
//! are the per-student aggregate state kept alongside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ActivityStatus, ContentId, ContentKind, QuizRank, RecordId, StudentId};

/// An activity record before the store assigned its id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewActivityRecord {
    /// Student the activity belongs to
    pub student_id: StudentId,
    /// Content node the activity is about
    pub content_id: ContentId,
    /// Course owning the content node (absent for course rows)
    pub course_id: Option<ContentId>,
    /// Kind of the content node
    pub kind: ContentKind,
    /// Start time
    pub started: DateTime<Utc>,
    /// Completion time, if completed
    pub completed: Option<DateTime<Utc>>,
    /// Completion status
    pub status: ActivityStatus,
}

impl NewActivityRecord {
    /// Last update time: the completion time if set, otherwise the start time
    pub fn updated(&self) -> DateTime<Utc> {
        self.completed.unwrap_or(self.started)
    }
}

/// One row capturing a single student's engagement with one content node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Store-assigned id
    pub id: RecordId,
    /// Student the activity belongs to
    pub student_id: StudentId,
    /// Content node the activity is about
    pub content_id: ContentId,
    /// Course owning the content node (absent for course rows)
    pub course_id: Option<ContentId>,
    /// Kind of the content node
    pub kind: ContentKind,
    /// Start time
    pub started: DateTime<Utc>,
    /// Completion time, if completed
    pub completed: Option<DateTime<Utc>>,
    /// Last update time
    pub updated: DateTime<Utc>,
    /// Completion status
    pub status: ActivityStatus,
}

impl ActivityRecord {
    /// Materialize a new record under the id assigned by the store
    pub fn from_new(id: RecordId, record: NewActivityRecord) -> Self {
        let updated = record.updated();
        Self {
            id,
            student_id: record.student_id,
            content_id: record.content_id,
            course_id: record.course_id,
            kind: record.kind,
            started: record.started,
            completed: record.completed,
            updated,
            status: record.status,
        }
    }
}

/// Sidecar key/value row attached to an activity record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityMeta {
    /// Record the value describes
    pub record_id: RecordId,
    /// Meta key, e.g. `steps_total` or `percentage`
    pub key: String,
    /// Meta value
    pub value: i64,
}

/// Progress entry of one course in a student's progress map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgress {
    /// Whether the course is completed
    pub completed: bool,
    /// Number of tracked units
    pub total: u32,
}

impl Default for CourseProgress {
    fn default() -> Self {
        Self { completed: false, total: 1 }
    }
}

/// One entry in a student's quiz history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAttempt {
    /// Quiz taken
    pub quiz: ContentId,
    /// Course the quiz was taken in
    pub course: ContentId,
    /// Quiz engine id of the quiz, when the platform has one
    pub pro_quiz_id: Option<u64>,
    /// Number of correct answers
    pub score: u32,
    /// Number of questions
    pub count: u32,
    /// Whether the attempt passed
    pub pass: bool,
    /// PASS or FAIL
    pub rank: QuizRank,
    /// Points earned
    pub points: u32,
    /// Points available
    pub total_points: u32,
    /// Score percentage
    pub percentage: u8,
    /// Seconds between start and completion
    pub time_spent: i64,
    /// Whether the attempt contains graded essay answers
    pub has_graded: bool,
    /// Reference into the quiz statistics tables
    pub statistic_ref_id: u64,
    /// Time the attempt was recorded
    pub time: DateTime<Utc>,
    /// Start time
    pub started: DateTime<Utc>,
    /// Completion time
    pub completed: DateTime<Utc>,
}

/// Naming convention of the legacy per-student completion markers
pub mod markers {
    use crate::types::ContentId;

    /// Marker written when a course is completed
    pub fn course_completed(course: ContentId) -> String {
        format!("course_completed_{}", course.0)
    }

    /// Marker written when a lesson or topic is completed
    pub fn lesson_completed(course: ContentId, lesson: ContentId) -> String {
        format!("completed_{}_{}", course.0, lesson.0)
    }

    /// Marker written when a completed course awards a certificate
    pub fn certificate_awarded(course: ContentId) -> String {
        format!("completed_certificate_{}", course.0)
    }

    /// Whether a marker key follows the completion marker convention
    ///
    /// This matches any key with one of the prefixes, including markers the
    /// simulator did not write itself.
    pub fn is_completion_marker(key: &str) -> bool {
        key.starts_with("completed_")
            || key.starts_with("course_completed_")
            || key.starts_with("completed_certificate_")
    }
}
