//! Three-segment expiring tokens.
//!
//! Only the payload segment is read. Signatures are never verified; the
//! server is the authority on whether a token is accepted.

use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use super::{TokenKind, TokenValidator};

/// Why a JWT payload could not be read.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Token does not have exactly three segments.
    #[error("expected 3 segments, found {0}")]
    Segments(usize),

    /// Payload is not valid base64.
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Payload is not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Payload is not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload decoded to something other than an object.
    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Validator for JWT credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtValidator;

impl JwtValidator {
    /// Decodes the payload segment into a JSON object.
    ///
    /// The segment is base64url; it is translated to the standard alphabet
    /// and padded to a multiple of four before decoding.
    pub fn decode_payload(raw: &str) -> Result<Map<String, Value>, PayloadError> {
        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() != 3 {
            return Err(PayloadError::Segments(segments.len()));
        }

        let mut encoded: String = segments[1]
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                other => other,
            })
            .collect();
        while encoded.len() % 4 != 0 {
            encoded.push('=');
        }

        let bytes = BASE64_STANDARD.decode(encoded.as_bytes())?;
        let text = String::from_utf8(bytes)?;
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            _ => Err(PayloadError::NotAnObject),
        }
    }

    /// Reads `exp` as epoch seconds. Numeric strings are accepted.
    fn exp_seconds(payload: &Map<String, Value>) -> Option<f64> {
        let exp = match payload.get("exp")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        exp.is_finite().then_some(exp)
    }
}

impl TokenValidator for JwtValidator {
    fn kind(&self) -> TokenKind {
        TokenKind::Jwt
    }

    fn detect(&self, raw: &str) -> bool {
        raw.split('.').count() == 3
    }

    fn validate(&self, raw: &str) -> bool {
        let segments: Vec<&str> = raw.split('.').collect();
        segments.len() == 3 && segments.iter().all(|s| !s.is_empty())
    }

    fn expiration(&self, raw: &str) -> Option<DateTime<Utc>> {
        let payload = Self::decode_payload(raw).ok()?;
        let exp = Self::exp_seconds(&payload)?;
        #[allow(clippy::cast_possible_truncation)]
        DateTime::from_timestamp_millis((exp * 1000.0) as i64)
    }

    fn is_expired_at(&self, raw: &str, now: DateTime<Utc>) -> bool {
        match Self::decode_payload(raw) {
            // Unreadable payloads are treated as expired.
            Err(_) => true,
            Ok(payload) => match Self::exp_seconds(&payload) {
                #[allow(clippy::cast_precision_loss)]
                Some(exp) => now.timestamp_millis() as f64 / 1000.0 >= exp,
                None => false,
            },
        }
    }
}
