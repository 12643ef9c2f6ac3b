use thiserror::Error;

use crate::domain::generation::{BackendErrorKind, BackendFailure};

/// Core domain errors
///
/// Cloneable so that a single generation outcome can be handed to every
/// caller waiting on the same fingerprint.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Invalid specification: {message}")]
    InvalidSpecification { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Embedding provider error: {provider} - {message}")]
    EmbeddingProvider {
        provider: String,
        message: String,
        transient: bool,
    },

    #[error("Generator backend error: {backend} ({kind}) - {message}")]
    GeneratorBackend {
        backend: String,
        kind: BackendErrorKind,
        message: String,
    },

    #[error("Generation failed: all {} backend(s) failed", .failures.len())]
    GenerationFailed { failures: Vec<BackendFailure> },

    #[error("HTTP error{}: {message}", .status.map(|s| format!(" {}", s)).unwrap_or_default())]
    Http {
        status: Option<u16>,
        message: String,
    },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Similarity index error: {message}")]
    SimilarityIndex { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    /// The whole request ran past its deadline; terminal for that request
    #[error("Request timed out after {timeout_ms}ms")]
    OverallTimeout { timeout_ms: u64 },

    #[error("Cancelled: {message}")]
    Cancelled { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn invalid_specification(message: impl Into<String>) -> Self {
        Self::InvalidSpecification {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingProvider {
            provider: provider.into(),
            message: message.into(),
            transient: false,
        }
    }

    pub fn embedding_transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingProvider {
            provider: provider.into(),
            message: message.into(),
            transient: true,
        }
    }

    pub fn backend(
        backend: impl Into<String>,
        kind: BackendErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::GeneratorBackend {
            backend: backend.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn generation_failed(failures: Vec<BackendFailure>) -> Self {
        Self::GenerationFailed { failures }
    }

    pub fn http(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn similarity_index(message: impl Into<String>) -> Self {
        Self::SimilarityIndex {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    pub fn overall_timeout(timeout_ms: u64) -> Self {
        Self::OverallTimeout { timeout_ms }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a single retry may reasonably succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status: None, .. } => true,
            Self::Http {
                status: Some(status),
                ..
            } => *status == 408 || *status == 429 || *status >= 500,
            Self::EmbeddingProvider { transient, .. } => *transient,
            Self::GeneratorBackend { kind, .. } => kind.is_retryable(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Classifies an error raised while invoking a generator backend
    pub fn backend_error_kind(&self) -> BackendErrorKind {
        match self {
            Self::GeneratorBackend { kind, .. } => *kind,
            Self::Timeout { .. } => BackendErrorKind::Timeout,
            Self::Validation { .. } | Self::InvalidSpecification { .. } => {
                BackendErrorKind::InvalidOutput
            }
            Self::Http { .. } if self.is_transient() => BackendErrorKind::Transient,
            Self::Http { .. } => BackendErrorKind::Rejected,
            _ => BackendErrorKind::Internal,
        }
    }

    /// Errors the caller of `resolve` is expected to see
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::InvalidSpecification { .. }
                | Self::GenerationFailed { .. }
                | Self::OverallTimeout { .. }
                | Self::Cancelled { .. }
        )
    }
}
