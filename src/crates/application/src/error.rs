use domain::error::StoreError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Source error: {0}")]
    SourceError(String),
    #[error("Credential error: {0}")]
    CredentialError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Unknown error: {0}")]
    UnknownError(String),
}
