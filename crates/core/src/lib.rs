//! Validation runs over the node operator registry.
//!
//! The [`Orchestrator`] wires the registry reader, the key validator and the
//! validation cache together and drives a run through its phases:
//!
//! - full: fetch, validate every key, update the cache
//! - fast: fetch, prune keys already known valid and used, validate the
//!   rest, update the cache
//! - input file: fetch, validate proposed keys against the registry

pub mod config;
pub mod error;
pub mod orchestrator;

pub use config::RunConfig;
pub use error::{OrchestratorError, Result};
pub use orchestrator::{Orchestrator, RunMode, RunPhase};
