//! Generated items and the test-case schema

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use super::BackendId;
use crate::domain::DomainError;

/// One result item tagged with the backend that produced it
///
/// Serialized flat: `{"backend_id": "...", ...payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedItem {
    pub backend_id: BackendId,

    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl GeneratedItem {
    /// Tags a payload object; a `backend_id` key inside the payload is dropped
    pub fn new(backend_id: BackendId, mut payload: Map<String, Value>) -> Self {
        payload.remove("backend_id");
        Self {
            backend_id,
            payload,
        }
    }

    /// Wraps a raw backend value, rejecting anything but a JSON object
    pub fn from_value(backend_id: BackendId, value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(payload) => Ok(Self::new(backend_id, payload)),
            other => Err(DomainError::validation(format!(
                "Expected a JSON object item, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Canonical rendering of the payload, used for exact-duplicate detection
    pub fn payload_key(&self) -> String {
        serde_json::to_string(&self.payload).unwrap_or_default()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Test case priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestCasePriority {
    High,
    #[default]
    Medium,
    Low,
}

/// Schema every LLM-produced test case must satisfy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TestCase {
    #[validate(length(min = 1, message = "id must not be empty"))]
    pub id: String,

    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,

    #[validate(length(min = 1, message = "at least one step is required"))]
    pub steps: Vec<String>,

    #[validate(length(min = 1, message = "expected_result must not be empty"))]
    pub expected_result: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub priority: TestCasePriority,
}

/// Envelope returned by LLM backends: `{"test_cases": [...]}`
#[derive(Debug, Clone, Deserialize)]
pub struct TestCaseBatch {
    pub test_cases: Vec<Value>,
}

impl TestCaseBatch {
    /// Parses and validates every case, failing on the first bad one
    pub fn into_validated(self) -> Result<Vec<TestCase>, DomainError> {
        self.test_cases
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let case: TestCase = serde_json::from_value(raw).map_err(|e| {
                    DomainError::validation(format!("test_cases[{}]: {}", index, e))
                })?;
                case.validate().map_err(|e| {
                    DomainError::validation(format!("test_cases[{}]: {}", index, e))
                })?;
                Ok(case)
            })
            .collect()
    }
}
