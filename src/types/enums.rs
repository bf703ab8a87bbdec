//! Enumeration types for the activity simulator
//!
//! This module contains the enumerations shared across the simulator:
//! content kinds, activity statuses, quiz ranks and activity store tables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of content nodes in the course hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Top-level course
    Course,
    /// Lesson inside a course
    Lesson,
    /// Topic inside a lesson
    Topic,
    /// Quiz attached to a lesson, a topic or directly to a course
    Quiz,
}

impl ContentKind {
    /// All content kinds in hierarchy order
    pub const ALL: [ContentKind; 4] =
        [ContentKind::Course, ContentKind::Lesson, ContentKind::Topic, ContentKind::Quiz];

    /// Whether outcomes of this kind follow the progress (non-quiz) rule
    pub fn is_progress_kind(&self) -> bool {
        !matches!(self, ContentKind::Quiz)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Course => write!(f, "course"),
            ContentKind::Lesson => write!(f, "lesson"),
            ContentKind::Topic => write!(f, "topic"),
            ContentKind::Quiz => write!(f, "quiz"),
        }
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "course" => Ok(ContentKind::Course),
            "lesson" => Ok(ContentKind::Lesson),
            "topic" => Ok(ContentKind::Topic),
            "quiz" => Ok(ContentKind::Quiz),
            _ => Err(format!("Unknown content kind: {}", s)),
        }
    }
}

/// Completion status of an activity record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Started but not completed
    NotStarted,
    /// Completed
    Completed,
}

impl ActivityStatus {
    /// Derive the status from whether a completion time is set
    pub fn from_completion<T>(completed: Option<&T>) -> Self {
        if completed.is_some() {
            ActivityStatus::Completed
        } else {
            ActivityStatus::NotStarted
        }
    }

    /// Whether this status marks a completed activity
    pub fn is_completed(&self) -> bool {
        matches!(self, ActivityStatus::Completed)
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityStatus::NotStarted => write!(f, "not_started"),
            ActivityStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Rank recorded in a student's quiz history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuizRank {
    /// Percentage reached the pass rate
    Pass,
    /// Percentage below the pass rate
    Fail,
}

impl From<bool> for QuizRank {
    fn from(pass: bool) -> Self {
        if pass {
            QuizRank::Pass
        } else {
            QuizRank::Fail
        }
    }
}

impl fmt::Display for QuizRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizRank::Pass => write!(f, "PASS"),
            QuizRank::Fail => write!(f, "FAIL"),
        }
    }
}

/// Tables of the activity store that support bulk deletion by record id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTable {
    /// Activity records
    Records,
    /// Activity meta rows, keyed by the record they describe
    Meta,
}

impl fmt::Display for ActivityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityTable::Records => write!(f, "user_activity"),
            ActivityTable::Meta => write!(f, "user_activity_meta"),
        }
    }
}
