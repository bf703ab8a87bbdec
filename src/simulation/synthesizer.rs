//! Random activity synthesis
//!
//! Turns a content kind and a time window into a plausible outcome: when the
//! student started, whether and when they finished, and for quizzes how they
//! scored. Synthesis never touches storage; every random draw comes from the
//! generator passed in, so a seeded generator reproduces the same outcomes.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::types::{ActivityParams, ActivityStatus, ContentKind};

/// Minimum gap kept between a non-quiz start and the end of the window
const MIN_PROGRESS_SPACING_SECONDS: i64 = 86_400;

/// Minimum gap kept between a quiz start and the end of the window
const MIN_QUIZ_SPACING_SECONDS: i64 = 3_600;

/// Range of seconds a quiz attempt lasts
const QUIZ_DURATION_SECONDS: (i64, i64) = (300, 1_800);

/// Range of question counts per quiz
const QUIZ_QUESTIONS: (u32, u32) = (5, 10);

/// Steps reported for a course
const COURSE_STEPS: u32 = 10;

/// Points awarded per correct answer
pub const POINTS_PER_QUESTION: u32 = 10;

/// Time window activity is spread across
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisWindow {
    /// Earliest start time
    pub start: DateTime<Utc>,
    /// Latest time for non-quiz activity
    pub end: DateTime<Utc>,
}

impl SynthesisWindow {
    /// Window of `days` days ending at `end`
    pub fn ending_at(end: DateTime<Utc>, days: u32) -> Self {
        Self { start: end - Duration::days(i64::from(days)), end }
    }
}

/// Outcome of a course, lesson or topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressOutcome {
    /// Start time
    pub started: DateTime<Utc>,
    /// Completion time, if completed
    pub completed: Option<DateTime<Utc>>,
    /// Steps the node consists of
    pub steps_total: u32,
    /// Steps the student finished
    pub steps_completed: u32,
}

/// Outcome of a quiz attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOutcome {
    /// Start time
    pub started: DateTime<Utc>,
    /// Completion time
    pub completed: DateTime<Utc>,
    /// Score percentage (0-100)
    pub percentage: u8,
    /// Questions in the attempt
    pub total_questions: u32,
    /// Questions answered correctly
    pub correct_count: u32,
    /// Whether the percentage reached the pass rate
    pub pass: bool,
}

impl QuizOutcome {
    /// Points earned
    pub fn points(&self) -> u32 {
        self.correct_count * POINTS_PER_QUESTION
    }

    /// Points available
    pub fn total_points(&self) -> u32 {
        self.total_questions * POINTS_PER_QUESTION
    }

    /// Seconds between start and completion
    pub fn time_spent(&self) -> i64 {
        (self.completed - self.started).num_seconds()
    }
}

/// Outcome of one synthesized activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SynthesizedOutcome {
    /// Course, lesson or topic outcome
    Progress(ProgressOutcome),
    /// Quiz outcome
    Quiz(QuizOutcome),
}

impl SynthesizedOutcome {
    /// Start time
    pub fn started(&self) -> DateTime<Utc> {
        match self {
            SynthesizedOutcome::Progress(p) => p.started,
            SynthesizedOutcome::Quiz(q) => q.started,
        }
    }

    /// Completion time, if completed
    pub fn completed(&self) -> Option<DateTime<Utc>> {
        match self {
            SynthesizedOutcome::Progress(p) => p.completed,
            SynthesizedOutcome::Quiz(q) => Some(q.completed),
        }
    }

    /// Completion status
    pub fn status(&self) -> ActivityStatus {
        ActivityStatus::from_completion(self.completed().as_ref())
    }
}

/// Synthesize the outcome of one activity
///
/// Courses, lessons and topics start somewhere in the window but no later
/// than one day before its end, and complete with probability
/// `completion_rate`%. Quizzes always complete; their completion may land
/// up to half an hour past the end of the window.
pub fn synthesize(
    kind: ContentKind,
    window: SynthesisWindow,
    params: &ActivityParams,
    rng: &mut dyn RngCore,
) -> SynthesizedOutcome {
    match kind {
        ContentKind::Quiz => SynthesizedOutcome::Quiz(synthesize_quiz(window, params, rng)),
        ContentKind::Course | ContentKind::Lesson | ContentKind::Topic => {
            SynthesizedOutcome::Progress(synthesize_progress(kind, window, params, rng))
        }
    }
}

fn synthesize_progress(
    kind: ContentKind,
    window: SynthesisWindow,
    params: &ActivityParams,
    rng: &mut dyn RngCore,
) -> ProgressOutcome {
    let latest_start = window.end - Duration::seconds(MIN_PROGRESS_SPACING_SECONDS);
    let started = uniform_time(window.start, latest_start, rng);

    let roll: u8 = rng.gen_range(1..=100);
    let completed = if roll <= params.completion_rate {
        Some(uniform_time(started, window.end, rng))
    } else {
        None
    };

    let (steps_total, steps_completed) = match (kind, completed.is_some()) {
        (ContentKind::Course, true) => (COURSE_STEPS, COURSE_STEPS),
        (ContentKind::Course, false) => (COURSE_STEPS, rng.gen_range(1..COURSE_STEPS)),
        (_, true) => (1, 1),
        (_, false) => (1, 0),
    };

    ProgressOutcome { started, completed, steps_total, steps_completed }
}

fn synthesize_quiz(
    window: SynthesisWindow,
    params: &ActivityParams,
    rng: &mut dyn RngCore,
) -> QuizOutcome {
    let latest_start = window.end - Duration::seconds(MIN_QUIZ_SPACING_SECONDS);
    let started = uniform_time(window.start, latest_start, rng);

    let percentage: u8 = rng.gen_range(0..=100);
    let total_questions = rng.gen_range(QUIZ_QUESTIONS.0..=QUIZ_QUESTIONS.1);
    let correct_count =
        (f64::from(percentage) / 100.0 * f64::from(total_questions)).round() as u32;
    let completed =
        started + Duration::seconds(rng.gen_range(QUIZ_DURATION_SECONDS.0..=QUIZ_DURATION_SECONDS.1));

    QuizOutcome {
        started,
        completed,
        percentage,
        total_questions,
        correct_count,
        pass: percentage >= params.quiz_pass_rate,
    }
}

/// Uniform time in `[from, to]` at second resolution; `from` when the range is empty
fn uniform_time(from: DateTime<Utc>, to: DateTime<Utc>, rng: &mut dyn RngCore) -> DateTime<Utc> {
    let span = (to - from).num_seconds();
    if span <= 0 {
        return from;
    }
    from + Duration::seconds(rng.gen_range(0..=span))
}
