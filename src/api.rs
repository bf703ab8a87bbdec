//! Request and response shapes of the generate/export/cleanup triad
//!
//! The transport layer in front of the simulator deserializes a
//! [`GenerateRequest`] and serializes whatever [`ResponseEnvelope`] comes
//! back. Authorization happens before any of this runs.

use serde::{Deserialize, Serialize};

use crate::simulation::SimulationError;
use crate::types::{ActivityParams, ContentId, StudentId};

/// Input of a generate call
///
/// Duplicate ids are ignored. Missing rate parameters fall back to the
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Students to simulate
    #[serde(default)]
    pub students: Vec<StudentId>,
    /// Courses to simulate
    #[serde(default)]
    pub courses: Vec<ContentId>,
    /// Rate parameters
    #[serde(flatten)]
    pub params: ActivityParams,
}

impl GenerateRequest {
    /// Request with default parameters
    pub fn new(students: impl IntoIterator<Item = StudentId>, courses: impl IntoIterator<Item = ContentId>) -> Self {
        Self {
            students: students.into_iter().collect(),
            courses: courses.into_iter().collect(),
            params: ActivityParams::default(),
        }
    }

    /// Replace the rate parameters
    pub fn with_params(mut self, params: ActivityParams) -> Self {
        self.params = params;
        self
    }
}

/// Outcome of one request, as sent back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseEnvelope<T> {
    /// The operation committed
    Success {
        /// Human readable confirmation
        message: String,
        /// Operation payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<T>,
    },
    /// The operation failed and nothing was changed
    Failure {
        /// Human readable error
        error: String,
        /// Stable machine readable code
        code: String,
    },
}

impl<T> ResponseEnvelope<T> {
    /// Success envelope carrying `data`
    pub fn success(message: impl Into<String>, data: T) -> Self {
        ResponseEnvelope::Success { message: message.into(), data: Some(data) }
    }

    /// Whether the operation committed
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success { .. })
    }

    /// Error code of a failure envelope
    pub fn code(&self) -> Option<&str> {
        match self {
            ResponseEnvelope::Success { .. } => None,
            ResponseEnvelope::Failure { code, .. } => Some(code),
        }
    }

    /// Payload of a success envelope
    pub fn data(&self) -> Option<&T> {
        match self {
            ResponseEnvelope::Success { data, .. } => data.as_ref(),
            ResponseEnvelope::Failure { .. } => None,
        }
    }
}

impl<T> From<SimulationError> for ResponseEnvelope<T> {
    fn from(err: SimulationError) -> Self {
        ResponseEnvelope::Failure { error: err.to_string(), code: err.code().to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_defaults() {
        let request: GenerateRequest =
            serde_json::from_str(r#"{"students": [4, 7], "courses": [120], "completion_rate": 50}"#).unwrap();
        assert_eq!(request.students, vec![StudentId(4), StudentId(7)]);
        assert_eq!(request.courses, vec![ContentId(120)]);
        assert_eq!(request.params.completion_rate, 50);
        assert_eq!(request.params.activity_days, 30);
        assert_eq!(request.params.quiz_pass_rate, 75);

        let empty: GenerateRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.students.is_empty());
    }

    #[test]
    fn test_failure_envelope() {
        let envelope: ResponseEnvelope<()> = SimulationError::NoData.into();
        assert!(!envelope.is_success());
        assert_eq!(envelope.code(), Some("no_data"));

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["code"], "no_data");
    }

    #[test]
    fn test_success_envelope() {
        let envelope = ResponseEnvelope::success("done", 3u32);
        assert!(envelope.is_success());
        assert_eq!(envelope.data(), Some(&3));

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["message"], "done");
        assert_eq!(json["data"], 3);
    }
}
