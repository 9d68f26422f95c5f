use crate::config::RunConfig;
use crate::error::Result;
use chrono::Utc;
use keycheck_crypto::{KeyValidator, ValidationResults};
use keycheck_registry::{normalize_input_keys, InputKey, RegistryReader};
use keycheck_rpc::{CallBatcher, CallProvider, CancellationToken};
use keycheck_storage::ValidationCache;
use keycheck_types::{
    Fingerprint, KeyLocator, KeyRecord, ValidationOutcome, ValidationReport, ValidationStatus,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Validate every key.
    Full,
    /// Skip keys the cache already knows to be valid and used.
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching,
    CachePrune,
    Validating,
    CacheUpdate,
    Reported,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Fetching => "fetching",
            RunPhase::CachePrune => "cache prune",
            RunPhase::Validating => "validating",
            RunPhase::CacheUpdate => "cache update",
            RunPhase::Reported => "reported",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Drives validation runs against one registry deployment.
///
/// The cache is written only after a run has fetched and validated
/// everything; a run that fails before that leaves it untouched.
pub struct Orchestrator<C> {
    reader: RegistryReader,
    validator: KeyValidator,
    cache: C,
    phase: Mutex<RunPhase>,
}

impl<C: ValidationCache> Orchestrator<C> {
    pub fn new(provider: Arc<dyn CallProvider>, config: RunConfig, cache: C) -> Self {
        let batcher = CallBatcher::new(provider, config.batch);
        Self {
            reader: RegistryReader::new(batcher, config.addresses),
            validator: KeyValidator::new(config.domain),
            cache,
            phase: Mutex::new(RunPhase::Idle),
        }
    }

    /// Phase of the current or last run.
    pub fn phase(&self) -> RunPhase {
        *self.phase.lock()
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Validate the registry's keys.
    pub async fn run(&self, mode: RunMode, cancel: &CancellationToken) -> Result<ValidationReport> {
        self.enter(RunPhase::Idle);
        let result = self.execute(mode, cancel).await;
        self.conclude(result)
    }

    /// Validate proposed keys against the live registry.
    ///
    /// Registry keys only take part in duplicate detection and only the
    /// proposed keys are reported. The cache is neither read nor written.
    pub async fn validate_input_keys(
        &self,
        inputs: Vec<InputKey>,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport> {
        self.enter(RunPhase::Idle);
        let result = self.execute_input(inputs, cancel).await;
        self.conclude(result)
    }

    async fn execute(&self, mode: RunMode, cancel: &CancellationToken) -> Result<ValidationReport> {
        self.enter(RunPhase::Fetching);
        let snapshot = self.reader.fetch_all_keys(cancel).await?;
        let withdrawal_credentials = snapshot.withdrawal_credentials;
        self.cache
            .ensure_withdrawal_credentials(&withdrawal_credentials)?;
        let occurrences = count_fingerprints(&snapshot.keys);

        let (candidates, cached) = match mode {
            RunMode::Full => (snapshot.keys, Vec::new()),
            RunMode::Fast => {
                self.enter(RunPhase::CachePrune);
                self.prune(snapshot.keys, &occurrences)?
            }
        };
        let known: HashSet<Fingerprint> = cached.iter().map(KeyRecord::fingerprint).collect();

        self.enter(RunPhase::Validating);
        info!(
            validating = candidates.len(),
            cached = cached.len(),
            "validating registry keys"
        );
        let results = self.validator.validate(&candidates, &known, Utc::now());

        let peers = peer_locators(candidates.iter().chain(&cached));
        let mut report = ValidationReport::new();
        for record in &cached {
            report.record(record, ValidationStatus::Valid, Vec::new());
        }
        record_results(&mut report, &candidates, &results, &peers);
        report.validated_count = candidates.len();
        report.cached_count = cached.len();

        self.enter(RunPhase::CacheUpdate);
        // A key sharing its fingerprint with another record has an outcome
        // that depends on its peers, so it is never persisted.
        let outcomes: Vec<ValidationOutcome> = candidates
            .iter()
            .filter(|r| !r.public_key.is_empty() && occurrences.get(&r.fingerprint()) == Some(&1))
            .filter_map(|r| results.get(&r.locator).cloned())
            .collect();
        self.cache
            .set_withdrawal_credentials(&withdrawal_credentials)?;
        self.cache.upsert(&outcomes)?;
        self.cache.close()?;
        debug!(offered = outcomes.len(), "cache updated");

        Ok(report.finish())
    }

    async fn execute_input(
        &self,
        inputs: Vec<InputKey>,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport> {
        self.enter(RunPhase::Fetching);
        let snapshot = self.reader.fetch_all_keys(cancel).await?;
        let candidates = normalize_input_keys(inputs, snapshot.withdrawal_credentials);
        let known: HashSet<Fingerprint> = snapshot
            .keys
            .iter()
            .filter(|k| !k.public_key.is_empty())
            .map(KeyRecord::fingerprint)
            .collect();

        self.enter(RunPhase::Validating);
        info!(
            proposed = candidates.len(),
            registry = known.len(),
            "validating proposed keys"
        );
        let results = self.validator.validate(&candidates, &known, Utc::now());

        let peers = peer_locators(candidates.iter().chain(&snapshot.keys));
        let mut report = ValidationReport::new();
        record_results(&mut report, &candidates, &results, &peers);
        report.validated_count = candidates.len();
        Ok(report.finish())
    }

    /// Split fetched keys into those that must be validated and those whose
    /// cached outcome still stands.
    fn prune(
        &self,
        keys: Vec<KeyRecord>,
        occurrences: &HashMap<Fingerprint, usize>,
    ) -> Result<(Vec<KeyRecord>, Vec<KeyRecord>)> {
        let mut candidates = Vec::with_capacity(keys.len());
        let mut cached = Vec::new();
        for record in keys {
            let fingerprint = record.fingerprint();
            // A repeated key has to be re-checked together with its peers.
            if occurrences.get(&fingerprint) != Some(&1) {
                candidates.push(record);
                continue;
            }
            match self.cache.lookup(&fingerprint)? {
                Some(hit) if hit.is_reusable() && hit.binding == record.binding() => {
                    cached.push(record);
                }
                Some(hit) if hit.is_reusable() => {
                    warn!(
                        locator = %record.locator,
                        fingerprint = %fingerprint,
                        "stale cache entry, signing data changed since last check"
                    );
                    candidates.push(record);
                }
                _ => candidates.push(record),
            }
        }
        Ok((candidates, cached))
    }

    fn enter(&self, phase: RunPhase) {
        let previous = std::mem::replace(&mut *self.phase.lock(), phase);
        debug!(from = %previous, to = %phase, "run phase");
    }

    fn conclude(&self, result: Result<ValidationReport>) -> Result<ValidationReport> {
        match &result {
            Ok(report) => {
                self.enter(RunPhase::Reported);
                info!(
                    total = report.total_keys,
                    valid = report.valid_count,
                    invalid_format = report.invalid_format_count,
                    duplicates = report.duplicate_count,
                    signature_mismatches = report.signature_mismatch_count,
                    "run complete"
                );
            }
            Err(err) => {
                self.enter(RunPhase::Failed);
                error!(error = %err, "run failed");
            }
        }
        result
    }
}

fn count_fingerprints(keys: &[KeyRecord]) -> HashMap<Fingerprint, usize> {
    let mut occurrences = HashMap::with_capacity(keys.len());
    for record in keys {
        *occurrences.entry(record.fingerprint()).or_default() += 1;
    }
    occurrences
}

fn peer_locators<'a>(
    records: impl Iterator<Item = &'a KeyRecord>,
) -> HashMap<Fingerprint, Vec<KeyLocator>> {
    let mut peers: HashMap<Fingerprint, Vec<KeyLocator>> = HashMap::new();
    for record in records {
        peers
            .entry(record.fingerprint())
            .or_default()
            .push(record.locator);
    }
    peers
}

fn record_results(
    report: &mut ValidationReport,
    candidates: &[KeyRecord],
    results: &ValidationResults,
    peers: &HashMap<Fingerprint, Vec<KeyLocator>>,
) {
    for record in candidates {
        let Some(outcome) = results.get(&record.locator) else {
            continue;
        };
        let duplicate_of = if outcome.status == ValidationStatus::Duplicate {
            let mut others: Vec<KeyLocator> = peers
                .get(&outcome.fingerprint)
                .into_iter()
                .flatten()
                .copied()
                .filter(|l| *l != record.locator)
                .collect();
            others.sort();
            others
        } else {
            Vec::new()
        };
        report.record(record, outcome.status, duplicate_of);
    }
}
