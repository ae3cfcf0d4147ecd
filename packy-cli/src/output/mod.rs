//! Output formatting for CLI.

mod json;
mod reporter;
mod text;

use chrono::{DateTime, Utc};
use packy_core::{Credential, TokenKind};

pub use json::JsonFormatter;
pub use reporter::CliReporter;
pub use text::TextFormatter;
#[cfg(test)]
mod tests;

/// What `token status` shows about the stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenStatus {
    /// Detected kind, `None` when nothing usable is stored.
    pub kind: Option<TokenKind>,
    /// Expiration instant, JWTs only.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the expiration has passed.
    pub expired: bool,
}

impl TokenStatus {
    /// Builds the status of a stored credential as of `now`.
    pub fn of(credential: Option<&Credential>, now: DateTime<Utc>) -> Self {
        match credential {
            Some(credential) => Self {
                kind: Some(credential.kind()),
                expires_at: credential.expiration(),
                expired: credential.is_expired_at(now),
            },
            None => Self::default(),
        }
    }
}
