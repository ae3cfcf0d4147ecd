//! Long-lived API keys.

use chrono::{DateTime, Utc};

use super::{TokenKind, TokenValidator};

/// Prefix every API key starts with.
pub const API_KEY_PREFIX: &str = "sk-";

/// Validator for `sk-` API keys. Keys never expire.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiKeyValidator;

impl TokenValidator for ApiKeyValidator {
    fn kind(&self) -> TokenKind {
        TokenKind::ApiKey
    }

    fn detect(&self, raw: &str) -> bool {
        raw.starts_with(API_KEY_PREFIX)
    }

    fn validate(&self, raw: &str) -> bool {
        self.detect(raw)
    }

    fn expiration(&self, _raw: &str) -> Option<DateTime<Utc>> {
        None
    }

    fn is_expired_at(&self, _raw: &str, _now: DateTime<Utc>) -> bool {
        false
    }
}
