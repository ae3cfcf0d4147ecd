//! Host error types.

use packy_core::ClassifiedError;
use thiserror::Error;

// ============================================================================
// Keychain Error
// ============================================================================

/// Error type for secure storage operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Access denied.
    #[error("Access denied to keychain")]
    AccessDenied,

    /// Keychain unavailable.
    #[error("Keychain unavailable: {0}")]
    Unavailable(String),

    /// Platform error.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Generic error.
    #[error("Keychain error: {0}")]
    Other(String),
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::Ambiguous(_) => {
                KeychainError::Other("Ambiguous credential entry".to_string())
            }
            keyring::Error::PlatformFailure(e) => KeychainError::Platform(e.to_string()),
            keyring::Error::NoStorageAccess(e) => {
                tracing::debug!(error = %e, "Keychain access denied");
                KeychainError::AccessDenied
            }
            _ => KeychainError::Other(err.to_string()),
        }
    }
}

impl From<KeychainError> for ClassifiedError {
    fn from(err: KeychainError) -> Self {
        ClassifiedError::unknown("secure storage failure").with_source(err)
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// Error type for HTTP client construction.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Proxy URL rejected.
    #[error("Invalid proxy URL {url}: {source}")]
    InvalidProxy {
        /// The configured proxy.
        url: String,
        /// Underlying cause.
        #[source]
        source: reqwest::Error,
    },

    /// Client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl From<HttpError> for ClassifiedError {
    fn from(err: HttpError) -> Self {
        let message = match &err {
            HttpError::InvalidProxy { .. } => "invalid proxy configuration",
            HttpError::Build(_) => "failed to build HTTP client",
        };
        ClassifiedError::unknown(message).with_source(err)
    }
}
