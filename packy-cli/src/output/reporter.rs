//! Error reporting for failures the scheduler absorbs.

use packy_core::ClassifiedError;
use packy_store::ErrorReporter;
use tracing::warn;

use super::{JsonFormatter, TextFormatter};
use crate::OutputFormat;

/// Prints each failed refresh to stderr with a kind-specific prefix.
pub struct CliReporter {
    format: OutputFormat,
    text: TextFormatter,
    json: JsonFormatter,
    quiet: bool,
}

impl CliReporter {
    /// Creates a reporter.
    pub fn new(format: OutputFormat, use_colors: bool, pretty: bool, quiet: bool) -> Self {
        Self {
            format,
            text: TextFormatter::new(use_colors),
            json: JsonFormatter::new(pretty),
            quiet,
        }
    }

    /// Renders an error the way [`ErrorReporter::report`] prints it.
    pub fn render(&self, error: &ClassifiedError) -> String {
        match self.format {
            OutputFormat::Text => self.text.format_error(error),
            OutputFormat::Json => self
                .json
                .format_error(error)
                .unwrap_or_else(|_| error.to_string()),
        }
    }
}

impl ErrorReporter for CliReporter {
    fn report(&self, error: &ClassifiedError) {
        warn!(kind = %error.kind(), error = %error, "Budget refresh failed");
        if !self.quiet {
            eprintln!("{}", self.render(error));
        }
    }
}
