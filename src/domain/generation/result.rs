//! Aggregated results and per-backend failures

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{BackendId, GeneratedItem};
use crate::domain::fingerprint::Fingerprint;

/// Where an aggregated result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    CacheExact,
    CacheSimilar,
    Generated,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheExact => "cache_exact",
            Self::CacheSimilar => "cache_similar",
            Self::Generated => "generated",
        }
    }
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a single backend's failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    Timeout,
    Transient,
    InvalidOutput,
    Rejected,
    Internal,
}

impl BackendErrorKind {
    /// Whether one more attempt is allowed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Transient => "transient",
            Self::InvalidOutput => "invalid_output",
            Self::Rejected => "rejected",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend that reached a failed terminal state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendFailure {
    pub backend_id: BackendId,
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendFailure {
    pub fn new(backend_id: BackendId, kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            backend_id,
            kind,
            message: message.into(),
        }
    }
}

/// The answer to a `resolve` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub source: ResultSource,

    /// Fingerprint of the requested specification
    pub fingerprint: Fingerprint,

    pub items: Vec<GeneratedItem>,

    #[serde(default)]
    pub errors: Vec<BackendFailure>,

    /// Similarity of the matched entry, for `cache_similar`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,

    /// Fingerprint of the entry whose payload was reused, for `cache_similar`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_fingerprint: Option<Fingerprint>,

    /// Hit counter of the served entry after this hit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_count: Option<u64>,
}

impl AggregatedResult {
    pub fn generated(
        fingerprint: Fingerprint,
        items: Vec<GeneratedItem>,
        errors: Vec<BackendFailure>,
    ) -> Self {
        Self {
            source: ResultSource::Generated,
            fingerprint,
            items,
            errors,
            similarity: None,
            matched_fingerprint: None,
            hit_count: None,
        }
    }

    pub fn cache_exact(fingerprint: Fingerprint, items: Vec<GeneratedItem>, hit_count: u64) -> Self {
        Self {
            source: ResultSource::CacheExact,
            fingerprint,
            items,
            errors: Vec::new(),
            similarity: None,
            matched_fingerprint: None,
            hit_count: Some(hit_count),
        }
    }

    pub fn cache_similar(
        fingerprint: Fingerprint,
        matched: Fingerprint,
        similarity: f32,
        items: Vec<GeneratedItem>,
        hit_count: u64,
    ) -> Self {
        Self {
            source: ResultSource::CacheSimilar,
            fingerprint,
            items,
            errors: Vec::new(),
            similarity: Some(similarity),
            matched_fingerprint: Some(matched),
            hit_count: Some(hit_count),
        }
    }

    pub fn failed_backends(&self) -> impl Iterator<Item = &BackendId> {
        self.errors.iter().map(|e| &e.backend_id)
    }
}
