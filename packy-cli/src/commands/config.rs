//! Config command - manage configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use packy_store::{default_config_dir, Settings, SettingsStore};
use tracing::info;

use super::load_settings;
use crate::output::JsonFormatter;
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Check the configuration for problems.
    Validate,

    /// Reset endpoint and polling settings to defaults.
    Reset,

    /// Set one value.
    ///
    /// Keys: endpoint, interval, polling, proxy, cookie, skip-when-fresh,
    /// timeout.
    Set {
        /// Setting key.
        key: String,
        /// New value. Use "" to clear the proxy.
        value: String,
    },
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<ExitCode> {
    let store = load_settings(cli).await?;

    match &args.action {
        ConfigAction::Show => show_config(&store, cli).await,
        ConfigAction::Path => show_paths(&store, cli),
        ConfigAction::Validate => validate_config(&store, cli).await,
        ConfigAction::Reset => reset_config(&store, cli).await,
        ConfigAction::Set { key, value } => set_value(&store, key, value, cli).await,
    }
}

async fn show_config(store: &SettingsStore, cli: &Cli) -> Result<ExitCode> {
    println!("{}", render_config(&store.get().await, cli)?);
    Ok(ExitCode::Success)
}

fn render_config(settings: &Settings, cli: &Cli) -> Result<String> {
    match cli.format {
        OutputFormat::Text => Ok(format!(
            "Packy Configuration\n{}\n\n{}",
            "─".repeat(40),
            settings.summary()
        )),
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            formatter.format(&settings.without_secrets())
        }
    }
}

fn show_paths(store: &SettingsStore, cli: &Cli) -> Result<ExitCode> {
    let config_dir = default_config_dir();
    let settings_path = store.path();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Settings file: {}", settings_path.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "settings_file": settings_path.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(ExitCode::Success)
}

async fn validate_config(store: &SettingsStore, cli: &Cli) -> Result<ExitCode> {
    let problems = store.get().await.validate();

    match cli.format {
        OutputFormat::Text => {
            if problems.is_empty() {
                println!("Configuration is valid");
            } else {
                for problem in &problems {
                    println!("✗ {problem}");
                }
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": problems.is_empty(),
                "problems": problems,
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&output)?);
        }
    }

    Ok(if problems.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::Error
    })
}

async fn reset_config(store: &SettingsStore, cli: &Cli) -> Result<ExitCode> {
    store.reset_to_defaults().await?;
    info!(path = %store.path().display(), "Settings reset");

    if !cli.quiet {
        println!("Endpoint and polling settings reset to defaults");
    }
    Ok(ExitCode::Success)
}

async fn set_value(store: &SettingsStore, key: &str, value: &str, cli: &Cli) -> Result<ExitCode> {
    store.try_update(|s| s.set_field(key, value)).await?;
    store.save().await?;
    info!(key, "Setting updated");

    if !cli.quiet {
        println!("{key} set to: {}", if value.is_empty() { "(none)" } else { value });
    }
    Ok(ExitCode::Success)
}
