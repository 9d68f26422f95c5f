//! BLS12-381 (min_pk) parsing and deposit signature verification.

use blst::min_pk::{PublicKey, Signature};
use blst::BLST_ERROR;
use keycheck_types::{PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

/// Proof-of-possession ciphersuite used by the beacon chain.
pub const DST_POP: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Decompress a public key and check it lies in the G1 prime-order subgroup.
///
/// The point at infinity is well-formed here; it fails later, at signature
/// verification.
pub fn parse_public_key(bytes: &[u8]) -> Option<PublicKey> {
    if bytes.len() != PUBLIC_KEY_LENGTH {
        return None;
    }
    let key = PublicKey::from_bytes(bytes).ok()?;
    match key.validate() {
        Ok(()) | Err(BLST_ERROR::BLST_PK_IS_INFINITY) => Some(key),
        Err(_) => None,
    }
}

/// Decompress a signature and check it is a G2 subgroup element.
pub fn parse_signature(bytes: &[u8]) -> Option<Signature> {
    if bytes.len() != SIGNATURE_LENGTH {
        return None;
    }
    Signature::sig_validate(bytes, false).ok()
}

/// Verify an already-validated signature over `message`.
///
/// An identity public key never verifies.
pub fn verify(public_key: &PublicKey, signature: &Signature, message: &[u8]) -> bool {
    // Both points were group-checked while parsing.
    signature.verify(false, message, DST_POP, &[], public_key, false) == BLST_ERROR::BLST_SUCCESS
}

/// Deterministic deposit signer for fixtures.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::DST_POP;
    use crate::deposit::DepositDomain;
    use blst::min_pk::SecretKey;

    pub struct DepositSigner {
        secret: SecretKey,
    }

    impl DepositSigner {
        pub fn from_seed(seed: u8) -> Self {
            let ikm = [seed; 32];
            let secret = SecretKey::key_gen(&ikm, &[]).expect("32-byte ikm is accepted");
            Self { secret }
        }

        pub fn public_key(&self) -> [u8; 48] {
            self.secret.sk_to_pk().compress()
        }

        pub fn sign(&self, message: &[u8]) -> [u8; 96] {
            self.secret.sign(message, DST_POP, &[]).compress()
        }

        /// Signature over the deposit message for this key.
        pub fn sign_deposit(&self, domain: &DepositDomain, withdrawal_credentials: &[u8; 32]) -> [u8; 96] {
            let root = domain.signing_root(&self.public_key(), withdrawal_credentials);
            self.sign(&root)
        }
    }
}
