//! Identifier types for the activity simulator
//!
//! Students, content nodes and activity records are addressed by the numeric
//! ids the host learning platform assigns them. Simulation batches get a
//! UUID-based identifier of their own.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a student (a platform user)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub u64);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "student#{}", self.0)
    }
}

impl FromStr for StudentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_numeric_id(s, "student#").map(StudentId)
    }
}

/// Identifier of a content node (course, lesson, topic or quiz)
///
/// The platform shares one id space across all content kinds, so a lesson id
/// and a topic id can both be the parent of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub u64);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "content#{}", self.0)
    }
}

impl FromStr for ContentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_numeric_id(s, "content#").map(ContentId)
    }
}

/// Identifier of a persisted activity record, assigned by the activity store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record#{}", self.0)
    }
}

fn parse_numeric_id(s: &str, prefix: &str) -> Result<u64, String> {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix(prefix).unwrap_or(trimmed);
    digits.parse::<u64>().map_err(|e| format!("Invalid identifier '{}': {}", s, e))
}

/// Unique identifier of one simulation batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(pub Uuid);

impl BatchId {
    /// Create a new random batch ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BATCH_{}", self.0.simple())
    }
}

impl Serialize for BatchId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BatchId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let raw = s.strip_prefix("BATCH_").unwrap_or(&s);
        let uuid = Uuid::parse_str(raw).map_err(serde::de::Error::custom)?;
        Ok(BatchId(uuid))
    }
}
