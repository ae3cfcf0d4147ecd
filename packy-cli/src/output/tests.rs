//! CLI output formatting tests.
//!
//! These tests verify that CLI output is correctly formatted for both
//! text and JSON output modes.

#[cfg(test)]
mod text_formatter_tests {
    use super::super::text::TextFormatter;
    use super::super::TokenStatus;
    use chrono::{TimeZone, Utc};
    use packy_core::{BudgetPeriod, BudgetSnapshot, ClassifiedError, TokenKind};

    fn scenario() -> BudgetSnapshot {
        BudgetSnapshot::new(BudgetPeriod::new(25.0, 100.0), BudgetPeriod::new(10.0, 0.0), true)
    }

    #[test]
    fn test_progress_bar_boundary_values() {
        let formatter = TextFormatter::new(false);

        let test_cases = vec![
            (0.0, "░░░░░░░░░░"),
            (10.0, "█░░░░░░░░░"),
            (25.0, "███░░░░░░░"), // 2.5 rounds to 3 blocks
            (50.0, "█████░░░░░"),
            (75.0, "████████░░"), // 7.5 rounds to 8 blocks
            (100.0, "██████████"),
        ];

        for (percent, expected) in test_cases {
            let bar = formatter.progress_bar(percent);
            assert_eq!(bar, expected, "Failed for {percent}%");
        }
    }

    #[test]
    fn test_progress_bar_with_colors() {
        let formatter = TextFormatter::new(true);

        assert!(formatter.progress_bar(95.0).contains("\x1b[31m"), "red at >=90%");
        assert!(formatter.progress_bar(80.0).contains("\x1b[33m"), "yellow at >=75%");
        assert!(formatter.progress_bar(60.0).contains("\x1b[34m"), "blue at >=50%");
        assert!(formatter.progress_bar(10.0).contains("\x1b[32m"), "green below 50%");
    }

    #[test]
    fn test_format_budget() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_budget(&scenario());

        assert!(output.contains("PackyCode Budget"));
        assert!(output.contains("✓ ok"));
        assert!(output.contains("Daily:"));
        assert!(output.contains("25.0%"));
        assert!(output.contains("$25.00 / $100.00 ($75.00 left)"));
        assert!(output.contains("$10.00 spent, no budget set"));
        assert!(output.contains("Opus:    enabled"));
    }

    #[test]
    fn test_format_budget_critical() {
        let formatter = TextFormatter::new(false);
        let snapshot =
            BudgetSnapshot::new(BudgetPeriod::new(95.0, 100.0), BudgetPeriod::new(0.0, 0.0), false);
        let output = formatter.format_budget(&snapshot);

        assert!(output.contains("✗ critical"));
        assert!(output.contains("Opus:    disabled"));
    }

    #[test]
    fn test_format_no_color_has_no_escapes() {
        let formatter = TextFormatter::new(false);
        assert!(!formatter.format_budget(&scenario()).contains('\x1b'));
        assert!(!formatter.format_no_token().contains('\x1b'));
    }

    #[test]
    fn test_format_no_token() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_no_token();
        assert!(output.contains("API token required"));
        assert!(output.contains("packy token set"));
    }

    #[test]
    fn test_error_prefixes() {
        let formatter = TextFormatter::new(false);

        let cases = vec![
            (ClassifiedError::api("request failed (500)"), "API request failed: request failed (500)"),
            (
                ClassifiedError::auth("authentication failed (401)"),
                "Authentication failed: authentication failed (401). Check your API token.",
            ),
            (ClassifiedError::network("request timeout"), "Network error: request timeout"),
            (ClassifiedError::validation("token cannot be empty"), "Invalid input: token cannot be empty"),
            (ClassifiedError::unknown("secure storage failure"), "Unexpected error: secure storage failure"),
        ];

        for (error, expected) in cases {
            assert_eq!(formatter.format_error(&error), expected);
        }
    }

    #[test]
    fn test_token_status_never_shows_secret() {
        let formatter = TextFormatter::new(false);

        let none = formatter.format_token_status(&TokenStatus::default());
        assert!(none.contains("not configured"));

        let api_key = formatter.format_token_status(&TokenStatus {
            kind: Some(TokenKind::ApiKey),
            expires_at: None,
            expired: false,
        });
        assert!(api_key.contains("API key"));
        assert!(api_key.contains("never"));

        let jwt = formatter.format_token_status(&TokenStatus {
            kind: Some(TokenKind::Jwt),
            expires_at: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
            expired: true,
        });
        assert!(jwt.contains("JWT"));
        assert!(jwt.contains("expired"));
    }

    #[test]
    fn test_watch_header() {
        let formatter = TextFormatter::new(false);
        let at = chrono::Local::now();

        assert!(formatter.format_watch_header(at, 30_000, true).contains("refresh: 30s"));
        assert!(formatter.format_watch_header(at, 30_000, false).contains("polling disabled"));
    }
}

#[cfg(test)]
mod json_formatter_tests {
    use super::super::json::JsonFormatter;
    use super::super::TokenStatus;
    use chrono::{TimeZone, Utc};
    use packy_core::{BudgetPeriod, BudgetSnapshot, ClassifiedError, TokenKind};

    #[test]
    fn test_format_budget_fields() {
        let formatter = JsonFormatter::new(false);
        let snapshot =
            BudgetSnapshot::new(BudgetPeriod::new(25.0, 100.0), BudgetPeriod::new(10.0, 0.0), true);
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let output = formatter.format_budget(&snapshot, at).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["daily"]["used"], 25.0);
        assert_eq!(value["daily"]["total"], 100.0);
        assert_eq!(value["daily"]["percentage"], 25.0);
        assert_eq!(value["daily"]["remaining"], 75.0);
        assert_eq!(value["monthly"]["percentage"], 0.0);
        assert_eq!(value["opusEnabled"], true);
        assert_eq!(value["severity"], "ok");
        assert_eq!(value["updatedAt"], "2025-06-01T12:00:00+00:00");
    }

    #[test]
    fn test_format_error() {
        let formatter = JsonFormatter::new(false);
        let output = formatter
            .format_error(&ClassifiedError::auth("authentication failed (403)"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "auth_error");
        assert_eq!(value["message"], "authentication failed (403)");
    }

    #[test]
    fn test_format_not_configured() {
        let formatter = JsonFormatter::new(false);
        let output = formatter.format_not_configured("token_required").unwrap();
        assert_eq!(output, r#"{"status":"token_required"}"#);
    }

    #[test]
    fn test_format_token_status() {
        let formatter = JsonFormatter::new(false);

        let output = formatter.format_token_status(&TokenStatus::default()).unwrap();
        assert_eq!(output, r#"{"configured":false,"expired":false}"#);

        let output = formatter
            .format_token_status(&TokenStatus {
                kind: Some(TokenKind::Jwt),
                expires_at: Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
                expired: false,
            })
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["configured"], true);
        assert_eq!(value["kind"], "jwt");
        assert_eq!(value["expiresAt"], "2030-01-01T00:00:00+00:00");
    }
}

#[cfg(test)]
mod reporter_tests {
    use super::super::CliReporter;
    use crate::OutputFormat;
    use packy_core::ClassifiedError;

    #[test]
    fn test_render_by_format() {
        let error = ClassifiedError::network("network connection failed");

        let text = CliReporter::new(OutputFormat::Text, false, false, true);
        assert_eq!(text.render(&error), "Network error: network connection failed");

        let json = CliReporter::new(OutputFormat::Json, false, false, true);
        assert!(json.render(&error).contains(r#""error":"network_error""#));
    }
}
