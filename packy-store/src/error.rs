//! Store error types.

use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unknown settings key.
    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    /// Value rejected for a settings key.
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Settings key.
        key: String,
        /// Rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl StoreError {
    /// Returns true if the file system was at fault rather than the input.
    pub fn is_io(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}
