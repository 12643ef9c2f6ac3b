//! Specification text normalization

use serde::{Deserialize, Serialize};

/// Rule applied to raw specification text before hashing and embedding
///
/// Leading and trailing whitespace is always trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationRule {
    /// Collapse runs of whitespace (including newlines) into a single space
    #[serde(default = "default_true")]
    pub collapse_whitespace: bool,

    /// Lowercase the text
    #[serde(default = "default_true")]
    pub case_fold: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NormalizationRule {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            case_fold: true,
        }
    }
}

impl NormalizationRule {
    /// Only trims, keeping interior whitespace and case
    pub fn verbatim() -> Self {
        Self {
            collapse_whitespace: false,
            case_fold: false,
        }
    }

    pub fn with_collapse_whitespace(mut self, collapse: bool) -> Self {
        self.collapse_whitespace = collapse;
        self
    }

    pub fn with_case_fold(mut self, fold: bool) -> Self {
        self.case_fold = fold;
        self
    }

    pub fn apply(&self, raw: &str) -> String {
        let collapsed = if self.collapse_whitespace {
            raw.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            raw.trim().to_string()
        };

        if self.case_fold {
            collapsed.to_lowercase()
        } else {
            collapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rule() {
        let rule = NormalizationRule::default();

        assert_eq!(
            rule.apply("  User   Login\twith\nEMAIL  "),
            "user login with email"
        );
    }

    #[test]
    fn test_verbatim_rule_only_trims() {
        let rule = NormalizationRule::verbatim();

        assert_eq!(rule.apply("  User   Login  "), "User   Login");
    }

    #[test]
    fn test_case_fold_without_collapse() {
        let rule = NormalizationRule::default().with_collapse_whitespace(false);

        assert_eq!(rule.apply(" A  B "), "a  b");
    }

    #[test]
    fn test_unicode_case_fold() {
        let rule = NormalizationRule::default();

        assert_eq!(rule.apply("ÜBER Straße"), "über straße");
    }

    #[test]
    fn test_whitespace_only_becomes_empty() {
        let rule = NormalizationRule::default();

        assert_eq!(rule.apply(" \n\t "), "");
    }
}
