use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Compressed BLS12-381 G1 public key length.
pub const PUBLIC_KEY_LENGTH: usize = 48;
/// Compressed BLS12-381 G2 signature length.
pub const SIGNATURE_LENGTH: usize = 96;
/// Withdrawal credentials length.
pub const WITHDRAWAL_CREDENTIALS_LENGTH: usize = 32;

pub type WithdrawalCredentials = [u8; WITHDRAWAL_CREDENTIALS_LENGTH];

/// Which list a key record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOrigin {
    Registry,
    Input,
}

/// Where a key record came from.
///
/// Registry keys always carry an operator id. Keys loaded from an input
/// file carry one only when the file provides it, and their `index` is the
/// position inside the file. The origin keeps the two apart even when the
/// numbers coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyLocator {
    pub origin: KeyOrigin,
    pub operator_id: Option<u64>,
    pub index: u64,
}

impl KeyLocator {
    pub fn operator(operator_id: u64, index: u64) -> Self {
        Self {
            origin: KeyOrigin::Registry,
            operator_id: Some(operator_id),
            index,
        }
    }

    pub fn input(index: u64) -> Self {
        Self {
            origin: KeyOrigin::Input,
            operator_id: None,
            index,
        }
    }

    /// Input-file locator that names the operator the key is proposed for.
    pub fn with_operator(self, operator_id: Option<u64>) -> Self {
        Self {
            operator_id,
            ..self
        }
    }
}

impl fmt::Display for KeyLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.origin, self.operator_id) {
            (KeyOrigin::Registry, id) => {
                write!(f, "operator #{} key #{}", id.unwrap_or_default(), self.index)
            }
            (KeyOrigin::Input, Some(id)) => {
                write!(f, "input key #{} (operator #{id})", self.index)
            }
            (KeyOrigin::Input, None) => write!(f, "input key #{}", self.index),
        }
    }
}

/// A single signing key as published in the registry (or proposed in a file).
///
/// Byte fields are kept as plain vectors: a key that failed to load, or was
/// published with the wrong length, must still be representable so that it
/// can be reported as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub locator: KeyLocator,
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub withdrawal_credentials: WithdrawalCredentials,
    pub used: bool,
}

impl KeyRecord {
    pub fn new(
        locator: KeyLocator,
        public_key: Vec<u8>,
        signature: Vec<u8>,
        withdrawal_credentials: WithdrawalCredentials,
        used: bool,
    ) -> Self {
        Self {
            locator,
            public_key,
            signature,
            withdrawal_credentials,
            used,
        }
    }

    /// Placeholder for a key whose bytes could not be fetched.
    ///
    /// The empty public key guarantees the record fails the format check.
    pub fn corrupt(
        locator: KeyLocator,
        withdrawal_credentials: WithdrawalCredentials,
        used: bool,
    ) -> Self {
        Self::new(locator, Vec::new(), Vec::new(), withdrawal_credentials, used)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_public_key(&self.public_key)
    }

    pub fn binding(&self) -> BindingDigest {
        BindingDigest::new(
            &self.public_key,
            &self.signature,
            &self.withdrawal_credentials,
        )
    }
}

/// Identity of a public key, used as the cache key.
///
/// Equal public key bytes always produce equal fingerprints.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(#[serde(with = "hex::serde")] [u8; 32]);

impl Fingerprint {
    pub fn of_public_key(public_key: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"keycheck:pubkey");
        hasher.update(public_key);
        Self(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", hex::encode(&self.0[..8]))
    }
}

/// Digest over everything a deposit signature is bound to.
///
/// A cached outcome is only reusable while the binding digest of the fetched
/// record still matches the one stored with it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingDigest(#[serde(with = "hex::serde")] [u8; 32]);

impl BindingDigest {
    pub fn new(public_key: &[u8], signature: &[u8], withdrawal_credentials: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"keycheck:binding");
        // Length prefixes keep (pk, sig) splits unambiguous for malformed lengths.
        for part in [public_key, signature, withdrawal_credentials] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }
}

impl fmt::Debug for BindingDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindingDigest({})", hex::encode(&self.0[..8]))
    }
}
