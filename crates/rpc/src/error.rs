use std::time::Duration;
use thiserror::Error;

/// Errors raised by a single attempt against the RPC endpoint.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("endpoint returned status {0}")]
    Status(u16),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("call reverted: {0}")]
    Reverted(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ProviderError::Malformed(msg.into())
    }

    /// Whether retrying the same request may succeed.
    ///
    /// A revert is the contract's answer and will not change on retry.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            ProviderError::Reverted(_) | ProviderError::InvalidEndpoint(_)
        )
    }
}

/// Per-call failure reported by the batcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// The chunk holding this call kept failing until retries ran out.
    #[error("batch exhausted after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
    /// The call itself failed deterministically (e.g. reverted).
    #[error("call failed: {0}")]
    Call(String),
    /// The chunk was never dispatched because the run was cancelled.
    #[error("call cancelled before dispatch")]
    Cancelled,
}

impl BatchError {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, BatchError::Exhausted { .. })
    }
}
