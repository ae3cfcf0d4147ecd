// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Packy CLI - PackyCode budget monitoring from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Show today's and this month's budget
//! packy
//!
//! # Store an API key (reads stdin when the argument is omitted)
//! packy token set sk-...
//!
//! # JSON output
//! packy --format json --pretty
//!
//! # Keep polling and redraw on every update
//! packy watch --interval 60000
//!
//! # Change the endpoint
//! packy config set endpoint https://www.packycode.com/api/backend/users/info
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use packy_core::{ClassifiedError, ErrorKind};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{config, token, usage, watch};

// ============================================================================
// CLI Definition
// ============================================================================

/// Packy CLI - PackyCode budget monitoring.
#[derive(Parser)]
#[command(name = "packy")]
#[command(about = "PackyCode budget usage monitor")]
#[command(long_about = r#"
Packy shows how much of your PackyCode daily and monthly budget is spent.

The API token is kept in the system keychain. Both API keys (sk-...) and
JWTs are accepted; an expired JWT is removed automatically.

Examples:
  packy                          # Fetch once and print the budget
  packy watch                    # Poll and redraw until Ctrl+C
  packy token set                # Read a token from stdin
  packy token status             # Show token kind and expiration
  packy config show              # Show current settings
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'usage' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Settings file to use instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch and show the current budget (default if no command specified).
    #[command(visible_alias = "u")]
    Usage,

    /// Poll the budget and redraw on every update.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),

    /// Manage the stored API token.
    Token(token::TokenArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// No token or endpoint configured.
    NotConfigured = 2,
    /// The token was rejected.
    AuthFailed = 3,
}

impl ExitCode {
    /// Picks the exit code for a failed command.
    pub fn for_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<ClassifiedError>().map(ClassifiedError::kind) {
            Some(ErrorKind::Auth) => ExitCode::AuthFailed,
            _ => ExitCode::Error,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let default_directives = if verbose { "packy=debug,info" } else { "packy=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Usage) | None => usage::run(&cli).await,
        Some(Commands::Watch(args)) => watch::run(args, &cli).await,
        Some(Commands::Token(args)) => token::run(args, &cli).await,
        Some(Commands::Config(args)) => config::run(args, &cli).await,
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            ExitCode::for_error(&e)
        }
    };

    if code != ExitCode::Success {
        std::process::exit(code as i32);
    }
}
