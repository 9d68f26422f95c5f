//! Deposit message signing roots.
//!
//! A deposit signature covers `hash_tree_root(SigningData)` where the object
//! is the `DepositMessage { pubkey, withdrawal_credentials, amount }` and the
//! domain is `DOMAIN_DEPOSIT` combined with the network's genesis fork
//! version and a zero genesis validators root. Only the fixed-size
//! containers involved are merkleized here, with SHA-256 over 32-byte chunks.

use keycheck_types::{Network, PUBLIC_KEY_LENGTH};
use sha2::{Digest, Sha256};

pub const DOMAIN_DEPOSIT: [u8; 4] = [0x03, 0x00, 0x00, 0x00];

/// 32 ETH expressed in gwei, the amount every registry deposit carries.
pub const DEPOSIT_AMOUNT_GWEI: u64 = 32_000_000_000;

type Chunk = [u8; 32];

/// Signing domain for deposits on one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositDomain {
    domain: [u8; 32],
    amount_gwei: u64,
}

impl DepositDomain {
    pub fn new(genesis_fork_version: [u8; 4], amount_gwei: u64) -> Self {
        Self {
            domain: compute_deposit_domain(genesis_fork_version),
            amount_gwei,
        }
    }

    pub fn for_network(network: Network) -> Self {
        Self::new(network.genesis_fork_version(), DEPOSIT_AMOUNT_GWEI)
    }

    pub fn domain(&self) -> &[u8; 32] {
        &self.domain
    }

    pub fn amount_gwei(&self) -> u64 {
        self.amount_gwei
    }

    /// Message a deposit signature has to verify against.
    pub fn signing_root(
        &self,
        public_key: &[u8; PUBLIC_KEY_LENGTH],
        withdrawal_credentials: &[u8; 32],
    ) -> [u8; 32] {
        let message_root =
            deposit_message_root(public_key, withdrawal_credentials, self.amount_gwei);
        hash_pair(&message_root, &self.domain)
    }
}

fn compute_deposit_domain(genesis_fork_version: [u8; 4]) -> [u8; 32] {
    let mut version_chunk = [0u8; 32];
    version_chunk[..4].copy_from_slice(&genesis_fork_version);
    let genesis_validators_root = [0u8; 32];
    let fork_data_root = hash_pair(&version_chunk, &genesis_validators_root);

    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(&DOMAIN_DEPOSIT);
    domain[4..].copy_from_slice(&fork_data_root[..28]);
    domain
}

fn deposit_message_root(
    public_key: &[u8; PUBLIC_KEY_LENGTH],
    withdrawal_credentials: &[u8; 32],
    amount_gwei: u64,
) -> [u8; 32] {
    // Bytes48 spans two chunks, the second right-padded with zeros.
    let mut low = [0u8; 32];
    let mut high = [0u8; 32];
    low.copy_from_slice(&public_key[..32]);
    high[..16].copy_from_slice(&public_key[32..]);
    let pubkey_root = hash_pair(&low, &high);

    let mut amount = [0u8; 32];
    amount[..8].copy_from_slice(&amount_gwei.to_le_bytes());

    merkleize(&[pubkey_root, *withdrawal_credentials, amount])
}

/// Merkle root of `chunks`, zero-padded to the next power of two.
fn merkleize(chunks: &[Chunk]) -> Chunk {
    let width = chunks.len().max(1).next_power_of_two();
    let mut layer: Vec<Chunk> = chunks.to_vec();
    layer.resize(width, [0u8; 32]);
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }
    layer[0]
}

fn hash_pair(left: &Chunk, right: &Chunk) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}
