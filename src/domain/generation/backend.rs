//! Generator backend capability

use std::fmt::{self, Debug};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::specification::SpecificationRequest;
use crate::domain::DomainError;

/// Maximum length for backend IDs
pub const MAX_BACKEND_ID_LENGTH: usize = 50;

static BACKEND_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$").unwrap());

/// Validates a backend ID: alphanumeric start, then alphanumerics, `-` or `_`
pub fn validate_backend_id(id: &str) -> Result<(), DomainError> {
    if id.is_empty() {
        return Err(DomainError::validation("Backend ID cannot be empty"));
    }

    if id.len() > MAX_BACKEND_ID_LENGTH {
        return Err(DomainError::validation(format!(
            "Backend ID too long: {} characters (max {})",
            id.len(),
            MAX_BACKEND_ID_LENGTH
        )));
    }

    if !BACKEND_ID_PATTERN.is_match(id) {
        return Err(DomainError::validation(format!(
            "Invalid backend ID format '{}'",
            id
        )));
    }

    Ok(())
}

/// Identifier of a configured generator backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        validate_backend_id(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BackendId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BackendId> for String {
    fn from(id: BackendId) -> Self {
        id.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A source of generated items for a specification
///
/// Backends are opaque: they may be slow, may fail, and may return output
/// that does not match the expected item shape. Each returned value must be a
/// JSON object; anything else is treated as invalid output by the caller.
#[async_trait]
pub trait GeneratorBackend: Send + Sync + Debug {
    fn id(&self) -> &BackendId;

    async fn generate(&self, spec: &SpecificationRequest) -> Result<Vec<Value>, DomainError>;
}
