//! Read-only contract calls against an Ethereum JSON-RPC endpoint.
//!
//! [`CallProvider`] is the seam the rest of the workspace talks to;
//! [`CallBatcher`] layers chunking, a bounded worker pool and retries on top
//! of any provider, and [`JsonRpcProvider`] is the HTTP implementation used
//! by the command-line tool.

pub mod batcher;
pub mod error;
pub mod http;
pub mod multicall;
pub mod provider;
pub mod retry;

pub use batcher::{BatchConfig, CallBatcher, CallOutcome};
pub use error::{BatchError, ProviderError};
pub use http::JsonRpcProvider;
pub use multicall::MULTICALL3_ADDRESS;
pub use provider::{CallProvider, CallResults, CallSpec};
pub use retry::{Backoff, RetryPolicy};
pub use tokio_util::sync::CancellationToken;
