//! Pure validation of registry keys.
//!
//! Checks run in a fixed precedence and the first failing one wins:
//! format, global uniqueness, then the deposit signature binding. The
//! result depends only on each record's bytes and on the multiset of public
//! keys in the universe, never on the order records were fetched in.

use crate::bls::{parse_public_key, parse_signature, verify};
use crate::deposit::DepositDomain;
use chrono::{DateTime, Utc};
use keycheck_types::{
    Fingerprint, KeyLocator, KeyRecord, ValidationOutcome, ValidationStatus, PUBLIC_KEY_LENGTH,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Outcomes keyed by record location. Locators must be unique among candidates.
pub type ValidationResults = BTreeMap<KeyLocator, ValidationOutcome>;

#[derive(Debug, Clone)]
pub struct KeyValidator {
    domain: DepositDomain,
}

impl KeyValidator {
    pub fn new(domain: DepositDomain) -> Self {
        Self { domain }
    }

    pub fn domain(&self) -> &DepositDomain {
        &self.domain
    }

    /// Validate `candidates`.
    ///
    /// `known_valid_used` holds keys that are part of the registry but were
    /// not re-validated (cache hits, or registry keys when checking a
    /// proposed file). They only take part in duplicate detection.
    pub fn validate(
        &self,
        candidates: &[KeyRecord],
        known_valid_used: &HashSet<Fingerprint>,
        checked_at: DateTime<Utc>,
    ) -> ValidationResults {
        let mut occurrences: HashMap<Fingerprint, usize> =
            HashMap::with_capacity(candidates.len() + known_valid_used.len());
        for fingerprint in known_valid_used {
            *occurrences.entry(*fingerprint).or_default() += 1;
        }
        for record in candidates {
            *occurrences.entry(record.fingerprint()).or_default() += 1;
        }

        debug!(
            candidates = candidates.len(),
            known = known_valid_used.len(),
            "validating keys"
        );

        candidates
            .par_iter()
            .map(|record| {
                let fingerprint = record.fingerprint();
                let duplicated = occurrences.get(&fingerprint).copied().unwrap_or(0) > 1;
                let status = self.check(record, duplicated);
                let outcome = ValidationOutcome::new(
                    fingerprint,
                    record.binding(),
                    status,
                    record.used,
                    checked_at,
                );
                (record.locator, outcome)
            })
            .collect()
    }

    /// Status of a single record given whether its public key occurs more
    /// than once in the universe.
    pub fn check(&self, record: &KeyRecord, duplicated: bool) -> ValidationStatus {
        let Some(public_key) = parse_public_key(&record.public_key) else {
            return ValidationStatus::InvalidFormat;
        };
        let Some(signature) = parse_signature(&record.signature) else {
            return ValidationStatus::InvalidFormat;
        };
        if duplicated {
            return ValidationStatus::Duplicate;
        }
        let Ok(key_bytes) = <[u8; PUBLIC_KEY_LENGTH]>::try_from(record.public_key.as_slice())
        else {
            return ValidationStatus::InvalidFormat;
        };

        let root = self
            .domain
            .signing_root(&key_bytes, &record.withdrawal_credentials);
        if verify(&public_key, &signature, &root) {
            ValidationStatus::Valid
        } else {
            ValidationStatus::SignatureMismatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls::testing::DepositSigner;
    use keycheck_types::Network;

    const WC: [u8; 32] = [0x01; 32];

    fn validator() -> KeyValidator {
        KeyValidator::new(DepositDomain::for_network(Network::Mainnet))
    }

    fn signed(op: u64, index: u64, seed: u8) -> KeyRecord {
        let signer = DepositSigner::from_seed(seed);
        let signature = signer.sign_deposit(validator().domain(), &WC);
        KeyRecord::new(
            KeyLocator::operator(op, index),
            signer.public_key().to_vec(),
            signature.to_vec(),
            WC,
            false,
        )
    }

    #[test]
    fn well_formed_unique_key_is_valid() {
        let record = signed(0, 0, 1);
        assert_eq!(validator().check(&record, false), ValidationStatus::Valid);
    }

    #[test]
    fn format_beats_duplicate() {
        let mut record = signed(0, 0, 1);
        record.signature.truncate(95);
        assert_eq!(validator().check(&record, true), ValidationStatus::InvalidFormat);
    }

    #[test]
    fn duplicate_beats_signature() {
        let mut record = signed(0, 0, 1);
        record.withdrawal_credentials = [0x02; 32];
        assert_eq!(validator().check(&record, true), ValidationStatus::Duplicate);
        assert_eq!(
            validator().check(&record, false),
            ValidationStatus::SignatureMismatch
        );
    }

    fn identity_key(op: u64) -> KeyRecord {
        let mut infinity = vec![0u8; PUBLIC_KEY_LENGTH];
        infinity[0] = 0xc0;
        let signature = DepositSigner::from_seed(5).sign(b"anything");
        KeyRecord::new(KeyLocator::operator(op, 0), infinity, signature.to_vec(), WC, true)
    }

    #[test]
    fn identity_key_fails_on_signature() {
        let results = validator().validate(&[identity_key(0)], &HashSet::new(), Utc::now());
        assert_eq!(
            results[&KeyLocator::operator(0, 0)].status,
            ValidationStatus::SignatureMismatch
        );
    }

    #[test]
    fn repeated_identity_key_is_duplicate() {
        let records = [identity_key(0), identity_key(1)];
        let results = validator().validate(&records, &HashSet::new(), Utc::now());
        assert!(results
            .values()
            .all(|o| o.status == ValidationStatus::Duplicate));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn known_set_counts_towards_duplicates() {
        let record = signed(0, 0, 1);
        let known: HashSet<_> = [record.fingerprint()].into_iter().collect();

        let results = validator().validate(&[record.clone()], &known, Utc::now());
        assert_eq!(
            results[&record.locator].status,
            ValidationStatus::Duplicate
        );
    }

    #[test]
    fn outcome_carries_record_identity() {
        let mut record = signed(4, 2, 9);
        record.used = true;
        let at = Utc::now();

        let results = validator().validate(&[record.clone()], &HashSet::new(), at);
        let outcome = &results[&KeyLocator::operator(4, 2)];
        assert_eq!(outcome.fingerprint, record.fingerprint());
        assert_eq!(outcome.binding, record.binding());
        assert!(outcome.used);
        assert_eq!(outcome.last_checked_at, at);
        assert!(outcome.is_reusable());
    }
}
