//! Budget snapshot types.
//!
//! - [`BudgetSnapshot`] - daily and monthly figures from one successful fetch
//! - [`BudgetPeriod`] - spend against a budget for one period
//! - [`OpusStatus`] - Opus model entitlement
//! - [`Severity`] - percentage bucket used for display

use serde::{Deserialize, Serialize};

// ============================================================================
// Budget Period
// ============================================================================

/// Spend against a budget for one period.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BudgetPeriod {
    /// Amount spent, in USD.
    pub used: f64,
    /// Budget for the period, in USD. Zero means unknown or unbounded.
    pub total: f64,
    /// `used / total * 100`, or zero when `total` is zero.
    pub percentage: f64,
}

impl BudgetPeriod {
    /// Creates a period and derives its percentage.
    pub fn new(used: f64, total: f64) -> Self {
        Self {
            used,
            total,
            percentage: percentage_of(used, total),
        }
    }

    /// Remaining budget, never negative. Zero when the total is unknown.
    pub fn remaining(&self) -> f64 {
        (self.total - self.used).max(0.0)
    }

    /// Returns true if the period has a known budget.
    pub fn has_budget(&self) -> bool {
        self.total > 0.0
    }

    /// Severity bucket of this period's percentage.
    pub fn severity(&self) -> Severity {
        Severity::from_percentage(self.percentage)
    }
}

/// Computes `used / total * 100`, yielding zero when `total` is not positive.
pub fn percentage_of(used: f64, total: f64) -> f64 {
    if total > 0.0 {
        used / total * 100.0
    } else {
        0.0
    }
}

// ============================================================================
// Opus Status
// ============================================================================

/// Opus model entitlement reported alongside the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpusStatus {
    /// Whether Opus is enabled for the account.
    pub enabled: bool,
}

// ============================================================================
// Budget Snapshot
// ============================================================================

/// Normalized budget figures returned by one successful fetch.
///
/// Snapshots are values: the cache replaces them wholesale and never edits
/// one in place. [`BudgetSnapshot::default`] is the zeroed "no data yet"
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    /// Daily budget.
    pub daily: BudgetPeriod,
    /// Monthly budget.
    pub monthly: BudgetPeriod,
    /// Opus entitlement.
    pub opus: OpusStatus,
}

impl BudgetSnapshot {
    /// Creates a snapshot from its parts.
    pub fn new(daily: BudgetPeriod, monthly: BudgetPeriod, opus_enabled: bool) -> Self {
        Self {
            daily,
            monthly,
            opus: OpusStatus {
                enabled: opus_enabled,
            },
        }
    }

    /// Highest percentage across both periods.
    pub fn max_percentage(&self) -> f64 {
        self.daily.percentage.max(self.monthly.percentage)
    }

    /// Worst severity across both periods.
    pub fn severity(&self) -> Severity {
        Severity::from_percentage(self.max_percentage())
    }
}

// ============================================================================
// Severity
// ============================================================================

/// Display bucket for a usage percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Below 50%.
    Ok,
    /// 50% or more.
    Info,
    /// 75% or more.
    Warning,
    /// 90% or more.
    Critical,
}

impl Severity {
    /// Classifies a percentage.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Severity::Critical
        } else if percentage >= 75.0 {
            Severity::Warning
        } else if percentage >= 50.0 {
            Severity::Info
        } else {
            Severity::Ok
        }
    }

    /// Single-character marker for terminal output.
    pub fn symbol(&self) -> &'static str {
        match self {
            Severity::Ok => "✓",
            Severity::Info => "ℹ",
            Severity::Warning => "⚠",
            Severity::Critical => "✗",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Ok => write!(f, "ok"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
