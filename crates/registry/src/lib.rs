//! Access to the on-chain node operator registry.
//!
//! [`RegistryReader`] turns batched contract calls into [`KeyRecord`]s;
//! [`parse_input_keys`] normalizes proposed keys from a deposit-data file
//! into the same shape.
//!
//! [`KeyRecord`]: keycheck_types::KeyRecord

pub mod contracts;
pub mod error;
pub mod input;
pub mod reader;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use contracts::RegistryAddresses;
pub use error::{RegistryError, Result};
pub use input::{normalize_input_keys, parse_input_keys, InputKey};
pub use reader::{RegistryReader, RegistrySnapshot, MAX_KEY_SLOTS, MAX_OPERATORS};
