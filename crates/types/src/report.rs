use crate::key::{KeyLocator, KeyRecord};
use crate::outcome::ValidationStatus;
use serde::{Deserialize, Serialize};

/// A key that did not come out `Valid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffendingKey {
    pub locator: KeyLocator,
    pub status: ValidationStatus,
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
    pub used: bool,
    /// Other records sharing the public key. Only filled for `Duplicate`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicate_of: Vec<KeyLocator>,
}

/// Aggregate result of one validation run. Rendering is left to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid_count: usize,
    pub invalid_format_count: usize,
    pub duplicate_count: usize,
    pub signature_mismatch_count: usize,
    /// Keys covered by the report.
    pub total_keys: usize,
    /// Keys that were actually run through the validator.
    pub validated_count: usize,
    /// Keys whose outcome was taken from the cache.
    pub cached_count: usize,
    pub offending_keys: Vec<OffendingKey>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one key under `status`.
    pub fn record(
        &mut self,
        record: &KeyRecord,
        status: ValidationStatus,
        duplicate_of: Vec<KeyLocator>,
    ) {
        self.total_keys += 1;
        match status {
            ValidationStatus::Valid => {
                self.valid_count += 1;
                return;
            }
            ValidationStatus::InvalidFormat => self.invalid_format_count += 1,
            ValidationStatus::Duplicate => self.duplicate_count += 1,
            ValidationStatus::SignatureMismatch => self.signature_mismatch_count += 1,
        }
        self.offending_keys.push(OffendingKey {
            locator: record.locator,
            status,
            public_key: record.public_key.clone(),
            used: record.used,
            duplicate_of,
        });
    }

    /// Sort offenders by location so reports compare independent of fetch order.
    pub fn finish(mut self) -> Self {
        self.offending_keys.sort_by(|a, b| a.locator.cmp(&b.locator));
        self
    }

    pub fn count(&self, status: ValidationStatus) -> usize {
        match status {
            ValidationStatus::Valid => self.valid_count,
            ValidationStatus::InvalidFormat => self.invalid_format_count,
            ValidationStatus::Duplicate => self.duplicate_count,
            ValidationStatus::SignatureMismatch => self.signature_mismatch_count,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.offending_keys.is_empty()
    }

    pub fn offenders_with(&self, status: ValidationStatus) -> impl Iterator<Item = &OffendingKey> {
        self.offending_keys.iter().filter(move |k| k.status == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(op: u64, index: u64) -> KeyRecord {
        KeyRecord::new(KeyLocator::operator(op, index), vec![op as u8; 48], vec![0; 96], [0; 32], false)
    }

    #[test]
    fn valid_keys_are_counted_but_not_listed() {
        let mut report = ValidationReport::new();
        report.record(&record(0, 0), ValidationStatus::Valid, Vec::new());
        report.record(&record(0, 1), ValidationStatus::SignatureMismatch, Vec::new());

        assert_eq!(report.total_keys, 2);
        assert_eq!(report.valid_count, 1);
        assert_eq!(report.signature_mismatch_count, 1);
        assert_eq!(report.offending_keys.len(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn finish_orders_offenders_by_locator() {
        let mut report = ValidationReport::new();
        report.record(&record(2, 0), ValidationStatus::InvalidFormat, Vec::new());
        report.record(&record(1, 5), ValidationStatus::InvalidFormat, Vec::new());
        let report = report.finish();

        let order: Vec<_> = report.offending_keys.iter().map(|k| k.locator).collect();
        assert_eq!(order, vec![KeyLocator::operator(1, 5), KeyLocator::operator(2, 0)]);
        assert_eq!(report.count(ValidationStatus::InvalidFormat), 2);
    }
}
