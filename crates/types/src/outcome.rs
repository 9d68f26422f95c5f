use crate::key::{BindingDigest, Fingerprint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of checking one key. Checks run in declaration order and the
/// first failing one decides the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    InvalidFormat,
    Duplicate,
    SignatureMismatch,
}

impl ValidationStatus {
    pub fn is_valid(self) -> bool {
        matches!(self, ValidationStatus::Valid)
    }

    pub fn label(self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::InvalidFormat => "invalid format",
            ValidationStatus::Duplicate => "duplicate",
            ValidationStatus::SignatureMismatch => "signature mismatch",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Last known validation result for a key, as persisted by the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub fingerprint: Fingerprint,
    pub binding: BindingDigest,
    pub status: ValidationStatus,
    pub used: bool,
    pub last_checked_at: DateTime<Utc>,
}

impl ValidationOutcome {
    pub fn new(
        fingerprint: Fingerprint,
        binding: BindingDigest,
        status: ValidationStatus,
        used: bool,
        last_checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint,
            binding,
            status,
            used,
            last_checked_at,
        }
    }

    /// Whether this outcome may stand in for re-validation in fast mode.
    pub fn is_reusable(&self) -> bool {
        self.status.is_valid() && self.used
    }

    /// Whether this outcome may be written to the cache at all.
    ///
    /// Duplicate status depends on the rest of the registry and can change
    /// between runs, so it is never persisted.
    pub fn is_cacheable(&self) -> bool {
        self.status != ValidationStatus::Duplicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: ValidationStatus, used: bool) -> ValidationOutcome {
        ValidationOutcome::new(
            Fingerprint::of_public_key(&[1; 48]),
            BindingDigest::new(&[1; 48], &[2; 96], &[3; 32]),
            status,
            used,
            Utc::now(),
        )
    }

    #[test]
    fn only_valid_and_used_is_reusable() {
        assert!(outcome(ValidationStatus::Valid, true).is_reusable());
        assert!(!outcome(ValidationStatus::Valid, false).is_reusable());
        assert!(!outcome(ValidationStatus::SignatureMismatch, true).is_reusable());
        assert!(!outcome(ValidationStatus::InvalidFormat, true).is_reusable());
    }

    #[test]
    fn duplicates_are_never_cacheable() {
        assert!(!outcome(ValidationStatus::Duplicate, true).is_cacheable());
        assert!(outcome(ValidationStatus::SignatureMismatch, false).is_cacheable());
    }

    #[test]
    fn outcome_survives_json() {
        let original = outcome(ValidationStatus::Valid, true);
        let encoded = serde_json::to_vec(&original).unwrap();
        let decoded: ValidationOutcome = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(original, decoded);
    }
}
