//! Classified error type shared by the fetch pipeline and token operations.

use thiserror::Error;

/// Boxed lower-level cause carried by a [`ClassifiedError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Tag of a [`ClassifiedError`].
///
/// Presentation layers react to the tag alone and never need to inspect the
/// wrapped cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Non-2xx response that is not an authentication failure.
    Api,
    /// HTTP 401/403; the stored credential has been purged.
    Auth,
    /// Timeout or transport failure.
    Network,
    /// Malformed or expired credential supplied by the user.
    Validation,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Stable identifier used in JSON output and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Api => "api_error",
            ErrorKind::Auth => "auth_error",
            ErrorKind::Network => "network_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Unknown => "unknown_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error produced by credential and fetch operations.
#[derive(Debug, Error)]
pub enum ClassifiedError {
    /// API request failed.
    #[error("API request failed: {message}")]
    Api {
        /// Human-readable description.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<BoxError>,
    },

    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    Auth {
        /// Human-readable description.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<BoxError>,
    },

    /// Network failure.
    #[error("Network error: {message}")]
    Network {
        /// Human-readable description.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<BoxError>,
    },

    /// Input validation failed.
    #[error("Validation failed: {message}")]
    Validation {
        /// Human-readable description.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<BoxError>,
    },

    /// Unclassified failure.
    #[error("Unknown error: {message}")]
    Unknown {
        /// Human-readable description.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<BoxError>,
    },
}

impl ClassifiedError {
    /// Creates an API error.
    pub fn api(message: impl Into<String>) -> Self {
        ClassifiedError::Api {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        ClassifiedError::Auth {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        ClassifiedError::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ClassifiedError::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unclassified error.
    pub fn unknown(message: impl Into<String>) -> Self {
        ClassifiedError::Unknown {
            message: message.into(),
            source: None,
        }
    }

    /// Attaches a lower-level cause.
    #[must_use]
    pub fn with_source(mut self, cause: impl Into<BoxError>) -> Self {
        let slot = match &mut self {
            ClassifiedError::Api { source, .. }
            | ClassifiedError::Auth { source, .. }
            | ClassifiedError::Network { source, .. }
            | ClassifiedError::Validation { source, .. }
            | ClassifiedError::Unknown { source, .. } => source,
        };
        *slot = Some(cause.into());
        self
    }

    /// Returns the tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifiedError::Api { .. } => ErrorKind::Api,
            ClassifiedError::Auth { .. } => ErrorKind::Auth,
            ClassifiedError::Network { .. } => ErrorKind::Network,
            ClassifiedError::Validation { .. } => ErrorKind::Validation,
            ClassifiedError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Returns the human-readable message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            ClassifiedError::Api { message, .. }
            | ClassifiedError::Auth { message, .. }
            | ClassifiedError::Network { message, .. }
            | ClassifiedError::Validation { message, .. }
            | ClassifiedError::Unknown { message, .. } => message,
        }
    }
}

impl From<serde_json::Error> for ClassifiedError {
    fn from(e: serde_json::Error) -> Self {
        ClassifiedError::unknown("invalid response body").with_source(e)
    }
}
