use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registry-wide data could not be read. Partial operator lists cannot be
    /// validated safely, so this aborts the fetch.
    #[error("registry metadata unavailable ({what}): {reason}")]
    Metadata { what: String, reason: String },
    #[error("registry fetch cancelled")]
    Cancelled,
    #[error("invalid input file: {0}")]
    InputFile(#[from] serde_json::Error),
}

impl RegistryError {
    pub(crate) fn metadata(what: impl Into<String>, reason: impl ToString) -> Self {
        RegistryError::Metadata {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
