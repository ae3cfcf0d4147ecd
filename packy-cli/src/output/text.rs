//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Local, Utc};
use packy_core::{BudgetPeriod, BudgetSnapshot, ClassifiedError, ErrorKind, Severity};

use super::TokenStatus;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Formats a budget snapshot.
    pub fn format_budget(&self, snapshot: &BudgetSnapshot) -> String {
        let severity = snapshot.severity();
        let mut lines = vec![format!(
            "{} {}",
            self.bold("PackyCode Budget"),
            self.color_for_severity(severity, &format!("{} {severity}", severity.symbol()))
        )];

        lines.push(self.format_period(&snapshot.daily, "Daily"));
        lines.push(self.format_period(&snapshot.monthly, "Monthly"));

        let opus = if snapshot.opus.enabled {
            self.green("enabled")
        } else {
            self.dim("disabled")
        };
        lines.push(format!("{:<9}{opus}", "Opus:"));

        lines.join("\n")
    }

    /// Formats one period line with a progress bar.
    fn format_period(&self, period: &BudgetPeriod, label: &str) -> String {
        let bar = self.progress_bar(period.percentage);
        let pct = self.color_for_severity(
            period.severity(),
            &format!("{:>5.1}%", period.percentage),
        );
        let amounts = if period.has_budget() {
            format!(
                "${:.2} / ${:.2} ({} left)",
                period.used,
                period.total,
                self.cyan(&format!("${:.2}", period.remaining()))
            )
        } else {
            format!("${:.2} spent, {}", period.used, self.dim("no budget set"))
        };

        format!("{:<9}{bar} {pct}  {amounts}", format!("{label}:"))
    }

    /// Formats a progress bar for a used percentage. Values outside 0-100
    /// are clamped for drawing.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn progress_bar(&self, percent_used: f64) -> String {
        let clamped = if percent_used.is_finite() {
            percent_used.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let filled = ((clamped / 100.0) * self.bar_width as f64).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_severity(Severity::from_percentage(percent_used), &bar)
    }

    /// Status shown when no usable token is stored.
    pub fn format_no_token(&self) -> String {
        format!(
            "{} {}\nRun {} to configure one.",
            self.yellow("⚠"),
            self.bold("API token required"),
            self.cyan("packy token set")
        )
    }

    /// Status shown when the endpoint is blank.
    pub fn format_no_endpoint(&self) -> String {
        format!(
            "{} {}\nRun {} to configure one.",
            self.yellow("⚠"),
            self.bold("API endpoint not configured"),
            self.cyan("packy config set endpoint <url>")
        )
    }

    /// Formats the stored token's kind and expiration. Never shows the
    /// secret.
    pub fn format_token_status(&self, status: &TokenStatus) -> String {
        let Some(kind) = status.kind else {
            return format!("Token:   {}", self.dim("not configured"));
        };

        let mut lines = vec![format!("Token:   {}", self.green(kind.display_name()))];
        let expiry = match status.expires_at {
            Some(at) if status.expired => self.red(&format!("expired {}", format_instant(at))),
            Some(at) => format!("expires {}", format_instant(at)),
            None => self.dim("never"),
        };
        lines.push(format!("Expiry:  {expiry}"));
        lines.join("\n")
    }

    /// Formats a classified error with a kind-specific prefix.
    pub fn format_error(&self, error: &ClassifiedError) -> String {
        let message = error.message();
        match error.kind() {
            ErrorKind::Api => format!("{}: {message}", self.red("API request failed")),
            ErrorKind::Auth => format!(
                "{}: {message}. Check your API token.",
                self.red("Authentication failed")
            ),
            ErrorKind::Network => format!("{}: {message}", self.red("Network error")),
            ErrorKind::Validation => format!("{}: {message}", self.yellow("Invalid input")),
            ErrorKind::Unknown => format!("{}: {message}", self.red("Unexpected error")),
        }
    }

    /// Header printed above each redraw in watch mode.
    pub fn format_watch_header(&self, at: DateTime<Local>, interval_ms: u64, polling: bool) -> String {
        let refresh = if polling {
            format!("refresh: {}s", interval_ms / 1000)
        } else {
            "polling disabled".to_string()
        };
        format!(
            "{} - {} ({})\n{}",
            self.bold("Packy Watch"),
            at.format("%H:%M:%S"),
            self.dim(&refresh),
            "─".repeat(50)
        )
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_severity(&self, severity: Severity, text: &str) -> String {
        match severity {
            Severity::Critical => self.red(text),
            Severity::Warning => self.yellow(text),
            Severity::Info => self.blue(text),
            Severity::Ok => self.green(text),
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn blue(&self, text: &str) -> String {
        self.paint(BLUE, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

// ============================================================================
// Tests
// ============================================================================
