//! Watch command - poll the budget and redraw on every update.

use std::io::{stdout, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, Utc};
use clap::Args;
use packy_core::BudgetSnapshot;
use packy_fetch::CredentialEvent;
use packy_store::{FreshnessPolicy, PollingScheduler, Settings, MIN_POLLING_INTERVAL_MS};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::usage::{fetch_once, print_status};
use super::Services;
use crate::output::{CliReporter, JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// How often the settings file is re-read for external edits.
const SETTINGS_RELOAD_PERIOD: Duration = Duration::from_secs(2);

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Polling interval in milliseconds. Overrides the configured interval
    /// for this session.
    #[arg(long, short)]
    pub interval: Option<u64>,
}

/// Polling parameters derived from settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPlan {
    /// Whether the scheduler runs at all.
    pub enabled: bool,
    /// Tick interval.
    pub interval: Duration,
    /// Freshness policy.
    pub policy: FreshnessPolicy,
}

impl PollPlan {
    /// Derives a plan. The interval never drops below the minimum.
    pub fn from_settings(settings: &Settings, interval_override: Option<u64>) -> Self {
        let ms = interval_override
            .unwrap_or(settings.polling_interval_ms)
            .max(MIN_POLLING_INTERVAL_MS);
        Self {
            enabled: settings.enable_polling,
            interval: Duration::from_millis(ms),
            policy: settings.freshness_policy(),
        }
    }

    /// Starts, restarts or stops `scheduler` to match this plan.
    pub fn apply(&self, scheduler: &PollingScheduler) {
        if self.enabled {
            scheduler.configure(self.interval, self.policy);
            scheduler.start();
        } else {
            scheduler.stop();
        }
    }
}

/// Runs the watch command.
pub async fn run(args: &WatchArgs, cli: &Cli) -> Result<ExitCode> {
    let services = Services::open(cli).await?;
    let reporter = Arc::new(CliReporter::new(cli.format, !cli.no_color, cli.pretty, cli.quiet));
    let scheduler = PollingScheduler::new(services.client.clone(), services.cache.clone(), reporter);

    let mut updates = services.cache.subscribe();
    let mut credential_events = services.credentials.subscribe();
    let mut settings_changes = services.settings.subscribe();

    let mut plan = PollPlan::from_settings(&services.settings.get().await, args.interval);
    info!(?plan, "Starting watch mode");

    // Startup fetch, then hand over to the scheduler.
    let status = fetch_once(&services).await;
    if cli.format == OutputFormat::Text {
        redraw_header(&plan, cli)?;
    }
    print_status(&status, cli)?;
    // The startup snapshot is already on screen.
    while updates.try_recv().is_ok() {}
    plan.apply(&scheduler);

    let mut reload_ticker = tokio::time::interval(SETTINGS_RELOAD_PERIOD);
    reload_ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch mode");
                break;
            }
            update = updates.recv() => match update {
                Ok(snapshot) => render(&snapshot, &plan, cli)?,
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Missed budget updates"),
                Err(RecvError::Closed) => break,
            },
            event = credential_events.recv() => match event {
                Ok(CredentialEvent::Expired) => {
                    warn!("Stored token expired and was removed");
                    notice("Stored JWT has expired and was removed. Run `packy token set`.", cli);
                }
                Ok(CredentialEvent::Removed) => {
                    info!("Stored token was removed");
                    notice("Stored token was removed. Run `packy token set`.", cli);
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            changed = settings_changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = PollPlan::from_settings(&services.settings.get().await, args.interval);
                if next != plan {
                    info!(?next, "Settings changed, updating polling");
                    next.apply(&scheduler);
                    plan = next;
                }
            }
            _ = reload_ticker.tick() => {
                if let Err(e) = services.settings.reload().await {
                    debug!(error = %e, "Settings reload failed, keeping current settings");
                }
            }
        }
    }

    scheduler.dispose();
    Ok(ExitCode::Success)
}

fn render(snapshot: &BudgetSnapshot, plan: &PollPlan, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            redraw_header(plan, cli)?;
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_budget(snapshot));
            println!();
            println!("Press Ctrl+C to exit");
        }
        OutputFormat::Json => {
            // One document per update.
            let formatter = JsonFormatter::new(false);
            println!("{}", formatter.format_budget(snapshot, Utc::now())?);
        }
    }
    Ok(())
}

fn redraw_header(plan: &PollPlan, cli: &Cli) -> Result<()> {
    print!("\x1b[2J\x1b[H");
    stdout().flush()?;

    let interval_ms = u64::try_from(plan.interval.as_millis()).unwrap_or(u64::MAX);
    let formatter = TextFormatter::new(!cli.no_color);
    println!("{}", formatter.format_watch_header(Local::now(), interval_ms, plan.enabled));
    println!();
    Ok(())
}

fn notice(message: &str, cli: &Cli) {
    if !cli.quiet {
        eprintln!("{message}");
    }
}

// ============================================================================
// Tests
// ============================================================================
