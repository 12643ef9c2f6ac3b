//! Per-call specification request

use std::fmt;

use crate::domain::fingerprint::Fingerprint;

/// A specification as received, together with its normalized form and key
///
/// Created per call by `FingerprintComputer::request` and never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct SpecificationRequest {
    raw: String,
    normalized: String,
    fingerprint: Fingerprint,
}

impl SpecificationRequest {
    pub(crate) fn new(
        raw: impl Into<String>,
        normalized: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            raw: raw.into(),
            normalized: normalized.into(),
            fingerprint,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

impl fmt::Debug for SpecificationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecificationRequest")
            .field("fingerprint", &self.fingerprint)
            .field("len", &self.raw.len())
            .finish()
    }
}
