//! Credential classification and validation.
//!
//! Two credential formats are recognized:
//!
//! - [`TokenKind::ApiKey`] - long-lived keys starting with `sk-`, never expire
//! - [`TokenKind::Jwt`] - three-segment tokens whose payload may carry `exp`
//!
//! Each format has a [`TokenValidator`] strategy. [`detect`] picks the
//! format for a raw string; everything else goes through the strategy.

mod api_key;
mod jwt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClassifiedError;

pub use api_key::{ApiKeyValidator, API_KEY_PREFIX};
pub use jwt::{JwtValidator, PayloadError};

// ============================================================================
// Token Kind
// ============================================================================

/// Recognized credential formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Long-lived API key (`sk-` prefix).
    #[serde(rename = "apikey")]
    ApiKey,
    /// Structured expiring token.
    #[serde(rename = "jwt")]
    Jwt,
}

impl TokenKind {
    /// Tag persisted next to the credential in secure storage.
    pub fn tag(&self) -> &'static str {
        match self {
            TokenKind::ApiKey => "apikey",
            TokenKind::Jwt => "jwt",
        }
    }

    /// Parses a persisted tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "apikey" => Some(TokenKind::ApiKey),
            "jwt" => Some(TokenKind::Jwt),
            _ => None,
        }
    }

    /// Display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            TokenKind::ApiKey => "API key",
            TokenKind::Jwt => "JWT",
        }
    }

    /// Returns the validation strategy for this format.
    pub fn validator(&self) -> &'static dyn TokenValidator {
        match self {
            TokenKind::ApiKey => &ApiKeyValidator,
            TokenKind::Jwt => &JwtValidator,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Validator Trait
// ============================================================================

/// Validation strategy for one credential format.
pub trait TokenValidator: Send + Sync {
    /// The format this strategy handles.
    fn kind(&self) -> TokenKind;

    /// Returns true if `raw` looks like this format.
    fn detect(&self, raw: &str) -> bool;

    /// Returns true if `raw` is well-formed for this format.
    fn validate(&self, raw: &str) -> bool;

    /// Expiration instant, if the token carries one and it can be read.
    fn expiration(&self, raw: &str) -> Option<DateTime<Utc>>;

    /// Returns true if the token is expired at `now`.
    fn is_expired_at(&self, raw: &str, now: DateTime<Utc>) -> bool;

    /// Returns true if the token is expired right now.
    fn is_expired(&self, raw: &str) -> bool {
        self.is_expired_at(raw, Utc::now())
    }
}

/// Strategies in detection order.
fn validators() -> [&'static dyn TokenValidator; 2] {
    [&ApiKeyValidator, &JwtValidator]
}

/// Detects the format of a raw credential.
pub fn detect(raw: &str) -> Option<TokenKind> {
    validators()
        .into_iter()
        .find(|v| v.detect(raw))
        .map(|v| v.kind())
}

/// Expiration instant of a raw credential, regardless of whether it is stored.
pub fn expiration(raw: &str) -> Option<DateTime<Utc>> {
    detect(raw).and_then(|kind| kind.validator().expiration(raw))
}

/// Checks user-supplied input before it is stored.
///
/// # Errors
///
/// Returns [`ClassifiedError::Validation`] if the input is empty, not a
/// recognized format, malformed, or already expired at `now`.
pub fn validate_token_input(raw: &str, now: DateTime<Utc>) -> Result<TokenKind, ClassifiedError> {
    if raw.trim().is_empty() {
        return Err(ClassifiedError::validation("token cannot be empty"));
    }

    let kind = detect(raw).ok_or_else(|| {
        ClassifiedError::validation(
            "unrecognized token format, provide an API key (sk-...) or a JWT",
        )
    })?;

    let validator = kind.validator();
    if !validator.validate(raw) {
        return Err(ClassifiedError::validation(format!(
            "invalid {} format",
            kind.display_name()
        )));
    }

    if validator.is_expired_at(raw, now) {
        return Err(match validator.expiration(raw) {
            Some(at) => ClassifiedError::validation(format!(
                "token has already expired (expired at {})",
                at.to_rfc3339()
            )),
            None => ClassifiedError::validation(format!(
                "invalid {} format: payload could not be decoded",
                kind.display_name()
            )),
        });
    }

    Ok(kind)
}

// ============================================================================
// Credential
// ============================================================================

/// A raw credential together with its detected format.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    raw: String,
    kind: TokenKind,
}

impl Credential {
    /// Pairs a raw credential with an already-resolved format.
    pub fn new(raw: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            raw: raw.into(),
            kind,
        }
    }

    /// Detects the format of `raw`.
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let kind = detect(&raw)?;
        Some(Self { raw, kind })
    }

    /// The secret itself.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Consumes the credential, returning the secret.
    pub fn into_raw(self) -> String {
        self.raw
    }

    /// The credential's format.
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Expiration instant, if any.
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.kind.validator().expiration(&self.raw)
    }

    /// Returns true if the credential is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.kind.validator().is_expired_at(&self.raw, now)
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.raw)
    }

    /// Masked form safe for logs.
    pub fn redacted(&self) -> String {
        let visible: String = self.raw.chars().take(4).collect();
        format!("{visible}***")
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("kind", &self.kind)
            .field("raw", &self.redacted())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
