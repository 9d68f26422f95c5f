use chrono::{TimeZone, Utc};
use keycheck_crypto::bls::testing::DepositSigner;
use keycheck_crypto::{DepositDomain, KeyValidator, ValidationResults};
use keycheck_types::{Fingerprint, KeyLocator, KeyRecord, Network, ValidationStatus};
use proptest::prelude::*;
use std::collections::HashSet;

const WITHDRAWAL_CREDENTIALS: [u8; 32] = {
    let mut wc = [0u8; 32];
    wc[0] = 0x01;
    wc[31] = 0xaa;
    wc
};

fn domain() -> DepositDomain {
    DepositDomain::for_network(Network::Holesky)
}

fn validator() -> KeyValidator {
    KeyValidator::new(domain())
}

fn signed_key(op: u64, index: u64, seed: u8) -> KeyRecord {
    let signer = DepositSigner::from_seed(seed);
    KeyRecord::new(
        KeyLocator::operator(op, index),
        signer.public_key().to_vec(),
        signer.sign_deposit(&domain(), &WITHDRAWAL_CREDENTIALS).to_vec(),
        WITHDRAWAL_CREDENTIALS,
        false,
    )
}

fn statuses(results: &ValidationResults) -> Vec<(KeyLocator, ValidationStatus)> {
    results.iter().map(|(l, o)| (*l, o.status)).collect()
}

fn fixed_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

#[test]
fn identical_keys_are_both_duplicates() {
    let first = signed_key(0, 0, 11);
    let mut second = signed_key(1, 0, 11);
    second.used = true;

    let results = validator().validate(&[first, second], &HashSet::new(), fixed_time());

    assert_eq!(
        statuses(&results),
        vec![
            (KeyLocator::operator(0, 0), ValidationStatus::Duplicate),
            (KeyLocator::operator(1, 0), ValidationStatus::Duplicate),
        ]
    );
}

#[test]
fn same_public_key_with_different_signature_is_duplicate() {
    let first = signed_key(0, 0, 12);
    let mut second = signed_key(1, 3, 12);
    second.signature = DepositSigner::from_seed(12).sign(b"something else").to_vec();

    let results = validator().validate(&[first, second], &HashSet::new(), fixed_time());
    assert!(results.values().all(|o| o.status == ValidationStatus::Duplicate));
}

#[test]
fn signature_over_other_credentials_is_a_mismatch() {
    let signer = DepositSigner::from_seed(13);
    let foreign_wc = [0x02; 32];
    let record = KeyRecord::new(
        KeyLocator::operator(2, 7),
        signer.public_key().to_vec(),
        signer.sign_deposit(&domain(), &foreign_wc).to_vec(),
        WITHDRAWAL_CREDENTIALS,
        false,
    );

    let results = validator().validate(&[record], &HashSet::new(), fixed_time());
    assert_eq!(
        results[&KeyLocator::operator(2, 7)].status,
        ValidationStatus::SignatureMismatch
    );
}

#[test]
fn signature_from_another_network_is_a_mismatch() {
    let signer = DepositSigner::from_seed(14);
    let mainnet = DepositDomain::for_network(Network::Mainnet);
    let record = KeyRecord::new(
        KeyLocator::operator(0, 0),
        signer.public_key().to_vec(),
        signer.sign_deposit(&mainnet, &WITHDRAWAL_CREDENTIALS).to_vec(),
        WITHDRAWAL_CREDENTIALS,
        false,
    );

    let results = validator().validate(&[record], &HashSet::new(), fixed_time());
    assert_eq!(
        results.values().next().map(|o| o.status),
        Some(ValidationStatus::SignatureMismatch)
    );
}

#[test]
fn two_operators_duplicate_and_malformed_scenario() {
    // Operator A: K1. Operator B: K1 again plus a truncated K2.
    let k1_a = signed_key(0, 0, 21);
    let k1_b = signed_key(1, 0, 21);
    let mut k2 = signed_key(1, 1, 22);
    k2.public_key.truncate(47);

    let results = validator().validate(&[k1_a, k1_b, k2], &HashSet::new(), fixed_time());

    let count = |status| results.values().filter(|o| o.status == status).count();
    assert_eq!(count(ValidationStatus::Duplicate), 2);
    assert_eq!(count(ValidationStatus::InvalidFormat), 1);
    assert_eq!(count(ValidationStatus::Valid), 0);
}

#[test]
fn corrupt_records_are_invalid_format() {
    let corrupt = KeyRecord::corrupt(KeyLocator::operator(3, 0), WITHDRAWAL_CREDENTIALS, true);
    let other = KeyRecord::corrupt(KeyLocator::operator(3, 1), WITHDRAWAL_CREDENTIALS, true);

    let results = validator().validate(&[corrupt, other], &HashSet::new(), fixed_time());
    assert!(results
        .values()
        .all(|o| o.status == ValidationStatus::InvalidFormat));
}

#[test]
fn known_keys_only_affect_uniqueness() {
    let record = signed_key(0, 0, 31);
    let unrelated: HashSet<Fingerprint> =
        [Fingerprint::of_public_key(&[9; 48])].into_iter().collect();

    let results = validator().validate(&[record], &unrelated, fixed_time());
    assert_eq!(results.len(), 1);
    assert_eq!(
        results.values().next().map(|o| o.status),
        Some(ValidationStatus::Valid)
    );
}

fn mixed_pool() -> Vec<KeyRecord> {
    let mut pool = vec![
        signed_key(0, 0, 41),
        signed_key(0, 1, 42),
        signed_key(1, 0, 41),
        signed_key(1, 1, 43),
        signed_key(2, 0, 44),
    ];
    pool[3].withdrawal_credentials = [0x07; 32];
    pool[4].signature.truncate(10);
    pool
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn validation_is_order_independent(shuffled in Just(mixed_pool()).prop_shuffle()) {
        let known: HashSet<Fingerprint> = HashSet::new();
        let baseline = validator().validate(&mixed_pool(), &known, fixed_time());
        let permuted = validator().validate(&shuffled, &known, fixed_time());
        prop_assert_eq!(baseline, permuted);
    }
}
