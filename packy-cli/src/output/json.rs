//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use packy_core::{BudgetPeriod, BudgetSnapshot, ClassifiedError, Severity};
use serde::{Serialize, Serializer};

use super::TokenStatus;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a budget snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetOutput {
    pub daily: PeriodOutput,
    pub monthly: PeriodOutput,
    pub opus_enabled: bool,
    pub severity: Severity,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// One budget period.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodOutput {
    pub used: f64,
    pub total: f64,
    pub percentage: f64,
    pub remaining: f64,
    pub severity: Severity,
}

/// Error or "not configured" status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutput {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Token kind and expiration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOutput {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_datetime_opt")]
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
}

// ============================================================================
// Serialization helpers
// ============================================================================

fn serialize_datetime<S>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&dt.to_rfc3339())
}

#[allow(clippy::ref_option)]
fn serialize_datetime_opt<S>(dt: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match dt {
        Some(dt) => s.serialize_str(&dt.to_rfc3339()),
        None => s.serialize_none(),
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats a budget snapshot.
    pub fn format_budget(&self, snapshot: &BudgetSnapshot, updated_at: DateTime<Utc>) -> Result<String> {
        self.format(&budget_to_output(snapshot, updated_at))
    }

    /// Formats a "not configured" status with a reason such as
    /// `token_required`.
    pub fn format_not_configured(&self, reason: &str) -> Result<String> {
        self.format(&StatusOutput {
            status: reason.to_string(),
            error: None,
            message: None,
        })
    }

    /// Formats a classified error.
    pub fn format_error(&self, error: &ClassifiedError) -> Result<String> {
        self.format(&StatusOutput {
            status: "error".to_string(),
            error: Some(error.kind().as_str().to_string()),
            message: Some(error.message().to_string()),
        })
    }

    /// Formats the stored token's status.
    pub fn format_token_status(&self, status: &TokenStatus) -> Result<String> {
        self.format(&TokenOutput {
            configured: status.kind.is_some(),
            kind: status.kind.map(|k| k.tag().to_string()),
            expires_at: status.expires_at,
            expired: status.expired,
        })
    }
}

/// Converts a snapshot to output.
pub fn budget_to_output(snapshot: &BudgetSnapshot, updated_at: DateTime<Utc>) -> BudgetOutput {
    BudgetOutput {
        daily: period_to_output(&snapshot.daily),
        monthly: period_to_output(&snapshot.monthly),
        opus_enabled: snapshot.opus.enabled,
        severity: snapshot.severity(),
        updated_at,
    }
}

fn period_to_output(period: &BudgetPeriod) -> PeriodOutput {
    PeriodOutput {
        used: period.used,
        total: period.total,
        percentage: period.percentage,
        remaining: period.remaining(),
        severity: period.severity(),
    }
}

// ============================================================================
// Tests
// ============================================================================
