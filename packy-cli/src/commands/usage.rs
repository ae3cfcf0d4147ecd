//! Usage command - fetch and display the current budget.

use anyhow::Result;
use chrono::Utc;
use packy_core::{BudgetSnapshot, ClassifiedError, ErrorKind};
use packy_fetch::{BudgetSource, CredentialEvent};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::Services;
use crate::output::{CliReporter, JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Outcome of one startup fetch.
#[derive(Debug)]
pub enum FetchStatus {
    /// Snapshot fetched and cached.
    Loaded(BudgetSnapshot),
    /// Endpoint is blank.
    NoEndpoint,
    /// No usable token is stored. `expired` is set if one was just purged.
    NoToken {
        /// The stored token had expired.
        expired: bool,
    },
    /// The fetch failed.
    Failed(ClassifiedError),
}

impl FetchStatus {
    /// Exit code for this status.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            FetchStatus::Loaded(_) => ExitCode::Success,
            FetchStatus::NoEndpoint | FetchStatus::NoToken { .. } => ExitCode::NotConfigured,
            FetchStatus::Failed(e) if e.kind() == ErrorKind::Auth => ExitCode::AuthFailed,
            FetchStatus::Failed(_) => ExitCode::Error,
        }
    }
}

/// Runs the usage command.
pub async fn run(cli: &Cli) -> Result<ExitCode> {
    let services = Services::open(cli).await?;
    let status = fetch_once(&services).await;
    print_status(&status, cli)?;
    Ok(status.exit_code())
}

/// Fetches once and stores the result in the cache.
pub async fn fetch_once(services: &Services) -> FetchStatus {
    let configured = services.settings.get().await.fetch_settings().is_configured();
    let mut events = services.credentials.subscribe();
    info!("Fetching budget");

    match services.client.fetch_budget_data().await {
        Ok(Some(snapshot)) => {
            services.cache.update_data(snapshot).await;
            FetchStatus::Loaded(snapshot)
        }
        Ok(None) => {
            let expired = saw_expiry(&mut events);
            if !configured && !expired {
                return FetchStatus::NoEndpoint;
            }
            debug!(expired, "No usable token");
            FetchStatus::NoToken { expired }
        }
        Err(e) => FetchStatus::Failed(e),
    }
}

fn saw_expiry(events: &mut broadcast::Receiver<CredentialEvent>) -> bool {
    let mut expired = false;
    while let Ok(event) = events.try_recv() {
        expired |= event == CredentialEvent::Expired;
    }
    expired
}

/// Prints a fetch status in the selected format. Errors go to stderr.
pub fn print_status(status: &FetchStatus, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            match status {
                FetchStatus::Loaded(snapshot) => println!("{}", formatter.format_budget(snapshot)),
                FetchStatus::NoEndpoint => println!("{}", formatter.format_no_endpoint()),
                FetchStatus::NoToken { expired } => {
                    if *expired {
                        println!("Stored JWT has expired and was removed.");
                    }
                    println!("{}", formatter.format_no_token());
                }
                FetchStatus::Failed(e) => report(e, cli),
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            match status {
                FetchStatus::Loaded(snapshot) => {
                    println!("{}", formatter.format_budget(snapshot, Utc::now())?);
                }
                FetchStatus::NoEndpoint => {
                    println!("{}", formatter.format_not_configured("endpoint_required")?);
                }
                FetchStatus::NoToken { expired: true } => {
                    println!("{}", formatter.format_not_configured("token_expired")?);
                }
                FetchStatus::NoToken { expired: false } => {
                    println!("{}", formatter.format_not_configured("token_required")?);
                }
                FetchStatus::Failed(e) => report(e, cli),
            }
        }
    }
    Ok(())
}

fn report(error: &ClassifiedError, cli: &Cli) {
    let reporter = CliReporter::new(cli.format, !cli.no_color, cli.pretty, cli.quiet);
    if !cli.quiet {
        eprintln!("{}", reporter.render(error));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use packy_fetch::{MemoryKeychain, SecretStorage, TOKEN_KEY};
    use packy_store::{Settings, SettingsStore};
    use tempfile::TempDir;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn services_for(endpoint: &str, storage: Arc<MemoryKeychain>) -> (Services, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let settings = SettingsStore::with_settings(
            temp_dir.path().join("settings.json"),
            Settings {
                api_endpoint: endpoint.to_string(),
                proxy: String::new(),
                ..Default::default()
            },
        );
        (Services::with_storage(settings, storage), temp_dir)
    }

    #[tokio::test]
    async fn test_fetch_once_loads_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "daily_budget_usd": 100,
                "daily_spent_usd": 25,
                "monthly_budget_usd": 0,
                "monthly_spent_usd": 10,
                "opus_enabled": true
            })))
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryKeychain::new());
        let (services, _dir) = services_for(&server.uri(), storage).await;
        services.credentials.set_token("sk-test").await.unwrap();

        let status = fetch_once(&services).await;
        let FetchStatus::Loaded(snapshot) = status else {
            panic!("expected a snapshot, got {status:?}");
        };
        assert_eq!(snapshot.daily.percentage, 25.0);
        assert!(snapshot.opus.enabled);
        assert!(services.cache.is_data_loaded().await);
    }

    #[tokio::test]
    async fn test_fetch_once_without_token() {
        let storage = Arc::new(MemoryKeychain::new());
        let (services, _dir) = services_for("http://127.0.0.1:9/info", storage).await;

        let status = fetch_once(&services).await;
        assert!(matches!(status, FetchStatus::NoToken { expired: false }));
        assert_eq!(status.exit_code(), ExitCode::NotConfigured);
    }

    #[tokio::test]
    async fn test_fetch_once_reports_expired_jwt() {
        let storage = Arc::new(MemoryKeychain::new());
        storage
            .set(TOKEN_KEY, &crate::test_support::jwt_expiring_at(1_000))
            .await
            .unwrap();
        let (services, _dir) = services_for("http://127.0.0.1:9/info", storage.clone()).await;

        let status = fetch_once(&services).await;
        assert!(matches!(status, FetchStatus::NoToken { expired: true }));
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_fetch_once_blank_endpoint() {
        let storage = Arc::new(MemoryKeychain::new());
        let (services, _dir) = services_for("   ", storage).await;

        let status = fetch_once(&services).await;
        assert!(matches!(status, FetchStatus::NoEndpoint));
    }

    #[tokio::test]
    async fn test_fetch_once_blank_endpoint_still_purges_expired_jwt() {
        let storage = Arc::new(MemoryKeychain::new());
        storage
            .set(TOKEN_KEY, &crate::test_support::jwt_expiring_at(1_000))
            .await
            .unwrap();
        let (services, _dir) = services_for("", storage.clone()).await;

        let status = fetch_once(&services).await;
        assert!(matches!(status, FetchStatus::NoToken { expired: true }));
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_auth_failure_exit_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryKeychain::new());
        let (services, _dir) = services_for(&server.uri(), storage.clone()).await;
        services.credentials.set_token("sk-rejected").await.unwrap();

        let status = fetch_once(&services).await;
        assert_eq!(status.exit_code(), ExitCode::AuthFailed);
        assert!(storage.is_empty().await);
    }
}
