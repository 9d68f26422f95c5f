use crate::error::ProviderError;
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

/// A read-only contract call: target contract plus ABI-encoded calldata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSpec {
    pub target: Address,
    pub data: Bytes,
}

impl CallSpec {
    pub fn new(target: Address, data: impl Into<Bytes>) -> Self {
        Self {
            target,
            data: data.into(),
        }
    }
}

/// Per-call results of one aggregated request, positionally aligned with its input.
pub type CallResults = Vec<Result<Bytes, ProviderError>>;

/// Read-only access to contracts on a chain.
#[async_trait]
pub trait CallProvider: Send + Sync {
    /// Execute a single call against the latest block.
    async fn call(&self, call: &CallSpec) -> Result<Bytes, ProviderError>;

    /// Execute several calls in one round trip where the backend supports it.
    ///
    /// The outer error means the round trip itself failed; per-call errors sit
    /// in the returned vector. The default issues the calls individually and
    /// concurrently.
    async fn aggregate(&self, calls: &[CallSpec]) -> Result<CallResults, ProviderError> {
        let pending = calls.iter().map(|call| self.call(call));
        Ok(futures::future::join_all(pending).await)
    }
}
