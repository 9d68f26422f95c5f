use keycheck_types::{Fingerprint, ValidationOutcome, WithdrawalCredentials};
use parking_lot::RwLock;
use sled::{Batch, Db, Tree};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cache errors
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(
        "Withdrawal credentials {current} do not match cached credentials {cached}, clear the cache to continue"
    )]
    WithdrawalCredentialsMismatch { cached: String, current: String },
    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;

const OUTCOME_PREFIX: &[u8] = b"outcome:";
const WITHDRAWAL_CREDENTIALS_KEY: &[u8] = b"meta:withdrawal_credentials";

/// File name prefix of the on-disk cache; the chain id is appended.
pub const CACHE_FILE_PREFIX: &str = "keycheck-cache-";

/// Last-known validation outcomes, keyed by fingerprint.
///
/// The cache is bound to the withdrawal credentials it was filled under:
/// outcomes computed against other credentials say nothing about the
/// current ones. Callers must not share one cache between overlapping runs.
pub trait ValidationCache: Send + Sync {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<ValidationOutcome>>;

    /// Insert or replace outcomes in one atomic write. Outcomes that must not
    /// be persisted (duplicates) are skipped.
    fn upsert(&self, outcomes: &[ValidationOutcome]) -> Result<()>;

    /// Drop every entry, including the credential binding, atomically.
    fn clear(&self) -> Result<()>;

    fn len(&self) -> Result<usize>;

    fn withdrawal_credentials(&self) -> Result<Option<WithdrawalCredentials>>;

    fn set_withdrawal_credentials(&self, credentials: &WithdrawalCredentials) -> Result<()>;

    /// Flush pending writes. The cache stays usable afterwards.
    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Fail when the cache holds outcomes for different withdrawal credentials.
    fn ensure_withdrawal_credentials(&self, current: &WithdrawalCredentials) -> Result<()> {
        match self.withdrawal_credentials()? {
            Some(cached) if &cached != current => Err(CacheError::WithdrawalCredentialsMismatch {
                cached: hex::encode(cached),
                current: hex::encode(current),
            }),
            _ => Ok(()),
        }
    }
}

fn outcome_key(fingerprint: &Fingerprint) -> Vec<u8> {
    let mut key = Vec::with_capacity(OUTCOME_PREFIX.len() + 32);
    key.extend_from_slice(OUTCOME_PREFIX);
    key.extend_from_slice(fingerprint.as_bytes());
    key
}

/// Sled-backed implementation
///
/// Sled holds an exclusive lock on its directory, so a second process
/// opening the same cache fails instead of interleaving writes.
pub struct SledValidationCache {
    db: Db,
    entries: Tree,
    path: PathBuf,
}

impl SledValidationCache {
    /// Open (or create) the cache for `chain_id` inside `dir`.
    pub fn open(dir: impl AsRef<Path>, chain_id: u64) -> Result<Self> {
        Self::open_path(Self::path_for(dir, chain_id))
    }

    pub fn path_for(dir: impl AsRef<Path>, chain_id: u64) -> PathBuf {
        dir.as_ref().join(format!("{CACHE_FILE_PREFIX}{chain_id}"))
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path)?;
        let entries = db.open_tree("validation_outcomes")?;
        debug!(path = %path.display(), entries = entries.len(), "opened validation cache");
        Ok(Self { db, entries, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ValidationCache for SledValidationCache {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<ValidationOutcome>> {
        self.entries
            .get(outcome_key(fingerprint))?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }

    fn upsert(&self, outcomes: &[ValidationOutcome]) -> Result<()> {
        let mut batch = Batch::default();
        let mut written = 0usize;
        for outcome in outcomes.iter().filter(|o| o.is_cacheable()) {
            batch.insert(outcome_key(&outcome.fingerprint), serde_json::to_vec(outcome)?);
            written += 1;
        }
        self.entries.apply_batch(batch)?;
        debug!(written, skipped = outcomes.len() - written, "cache upsert");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut batch = Batch::default();
        for key in self.entries.iter().keys() {
            batch.remove(key?);
        }
        self.entries.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.scan_prefix(OUTCOME_PREFIX).count())
    }

    fn withdrawal_credentials(&self) -> Result<Option<WithdrawalCredentials>> {
        let Some(raw) = self.entries.get(WITHDRAWAL_CREDENTIALS_KEY)? else {
            return Ok(None);
        };
        let credentials = WithdrawalCredentials::try_from(raw.as_ref()).map_err(|_| {
            CacheError::Corrupt(format!(
                "withdrawal credentials entry has {} bytes",
                raw.len()
            ))
        })?;
        Ok(Some(credentials))
    }

    fn set_withdrawal_credentials(&self, credentials: &WithdrawalCredentials) -> Result<()> {
        self.entries
            .insert(WITHDRAWAL_CREDENTIALS_KEY, credentials.as_slice())?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// In-memory backend for tests and one-shot runs
#[derive(Default)]
pub struct MemoryValidationCache {
    entries: RwLock<HashMap<Fingerprint, ValidationOutcome>>,
    withdrawal_credentials: RwLock<Option<WithdrawalCredentials>>,
}

impl MemoryValidationCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ValidationCache for MemoryValidationCache {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<ValidationOutcome>> {
        Ok(self.entries.read().get(fingerprint).cloned())
    }

    fn upsert(&self, outcomes: &[ValidationOutcome]) -> Result<()> {
        let mut entries = self.entries.write();
        for outcome in outcomes.iter().filter(|o| o.is_cacheable()) {
            entries.insert(outcome.fingerprint, outcome.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        // Hold both locks so readers never observe a half-cleared cache.
        let mut entries = self.entries.write();
        let mut credentials = self.withdrawal_credentials.write();
        entries.clear();
        *credentials = None;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }

    fn withdrawal_credentials(&self) -> Result<Option<WithdrawalCredentials>> {
        Ok(*self.withdrawal_credentials.read())
    }

    fn set_withdrawal_credentials(&self, credentials: &WithdrawalCredentials) -> Result<()> {
        *self.withdrawal_credentials.write() = Some(*credentials);
        Ok(())
    }
}
