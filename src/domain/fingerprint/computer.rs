//! Fingerprint computation

use super::{Fingerprint, NormalizationRule};
use crate::domain::specification::SpecificationRequest;
use crate::domain::DomainError;

/// Normalizes specifications and derives their exact-match key
///
/// Pure and side-effect free: equal normalized text always yields an equal
/// fingerprint.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintComputer {
    rule: NormalizationRule,
}

impl FingerprintComputer {
    pub fn new(rule: NormalizationRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> &NormalizationRule {
        &self.rule
    }

    pub fn normalize(&self, raw: &str) -> String {
        self.rule.apply(raw)
    }

    pub fn fingerprint(&self, raw: &str) -> Result<Fingerprint, DomainError> {
        let normalized = self.normalized_non_empty(raw)?;
        Ok(Fingerprint::of_normalized(&normalized))
    }

    /// Builds the per-call request carrying raw text, normalized text and key
    pub fn request(&self, raw: &str) -> Result<SpecificationRequest, DomainError> {
        let normalized = self.normalized_non_empty(raw)?;
        let fingerprint = Fingerprint::of_normalized(&normalized);

        Ok(SpecificationRequest::new(raw, normalized, fingerprint))
    }

    fn normalized_non_empty(&self, raw: &str) -> Result<String, DomainError> {
        let normalized = self.normalize(raw);

        if normalized.is_empty() {
            return Err(DomainError::invalid_specification(
                "Specification is empty after normalization",
            ));
        }

        Ok(normalized)
    }
}
