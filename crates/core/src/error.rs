use keycheck_registry::RegistryError;
use keycheck_storage::CacheError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("registry fetch failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("validation cache error: {0}")]
    Cache(#[from] CacheError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
