//! Error and outcome types shared by the sync operations

use serde::Serialize;
use thiserror::Error;

/// Errors raised by the upsert engine, the exporter and their collaborators
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required setting is missing or invalid; raised before any connection attempt
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The store is unreachable or rejected the credentials
    #[error("Connection error: {0}")]
    Connection(String),

    /// The dataset was rejected before anything was written
    #[error("Validation error: {0}")]
    Validation(String),

    /// Staging, merge or read failed at the store
    #[error("Execution error: {0}")]
    Execution(String),

    /// The spreadsheet could not be read or produced
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),
}

impl SyncError {
    /// Wrap a store error raised while running `step`
    pub(crate) fn execution(step: &str, err: sqlx::Error) -> Self {
        SyncError::Execution(format!("{}: {}", step, err))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// What an operation reports back to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<SyncError> for Outcome {
    fn from(err: SyncError) -> Self {
        Outcome::failure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_converts_to_failed_outcome() {
        let outcome = Outcome::from(SyncError::Validation("dataset is empty".to_string()));
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Validation error: dataset is empty");
    }
}
