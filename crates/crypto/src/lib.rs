//! Cryptography for validator key checks.
//!
//! - [`deposit`]: deposit domain and signing-root computation
//! - [`bls`]: BLS12-381 public key / signature parsing and verification
//! - [`validator`]: the pure key validator built on both

pub mod bls;
pub mod deposit;
pub mod validator;

pub use deposit::{DepositDomain, DEPOSIT_AMOUNT_GWEI, DOMAIN_DEPOSIT};
pub use validator::{KeyValidator, ValidationResults};
