//! Shared data model for validator key checks.
//!
//! Records pulled from the operator registry, the fingerprints used to
//! address them in the validation cache, per-key outcomes and the
//! aggregate report handed back to callers.

pub mod key;
pub mod network;
pub mod operator;
pub mod outcome;
pub mod report;

pub use key::*;
pub use network::*;
pub use operator::*;
pub use outcome::*;
pub use report::*;
