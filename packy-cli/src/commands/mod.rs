//! CLI command implementations and shared service wiring.

pub mod config;
pub mod token;
pub mod usage;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use packy_core::{system_clock, ErrorKind};
use packy_fetch::{BudgetApiClient, CredentialStore, MigrationOutcome, SecretStorage, SystemKeychain};
use packy_store::{BudgetCache, SettingsStore};
use tracing::{debug, info, warn};

use crate::Cli;

/// Loads the settings store from `--config` or the default location.
pub async fn load_settings(cli: &Cli) -> Result<SettingsStore> {
    let store = match &cli.config {
        Some(path) => SettingsStore::load(path.clone()).await?,
        None => SettingsStore::load_default().await?,
    };
    Ok(store)
}

/// Services shared by the budget commands.
pub struct Services {
    /// Persistent settings.
    pub settings: Arc<SettingsStore>,
    /// Stored credential.
    pub credentials: Arc<CredentialStore>,
    /// Remote budget client.
    pub client: Arc<BudgetApiClient>,
    /// Latest snapshot.
    pub cache: Arc<BudgetCache>,
}

impl Services {
    /// Wires services over the system keychain and runs startup migrations.
    pub async fn open(cli: &Cli) -> Result<Self> {
        let storage: Arc<dyn SecretStorage> = Arc::new(SystemKeychain::new());
        let services = Self::with_storage(load_settings(cli).await?, storage);
        services.migrate().await;
        Ok(services)
    }

    /// Wires services over the given settings and secret storage.
    pub fn with_storage(settings: SettingsStore, storage: Arc<dyn SecretStorage>) -> Self {
        let clock = system_clock();
        let settings = Arc::new(settings);
        let credentials = Arc::new(CredentialStore::new(storage, clock.clone()));
        let client = Arc::new(BudgetApiClient::new(credentials.clone(), settings.clone()));
        let cache = Arc::new(BudgetCache::new(clock));

        Self {
            settings,
            credentials,
            client,
            cache,
        }
    }

    /// Moves a legacy plaintext token into secure storage and tags an
    /// untagged stored credential. Failures are logged and never abort
    /// startup.
    ///
    /// The plaintext token stays in the settings file until secure storage
    /// has accepted it or it has been rejected as invalid.
    pub async fn migrate(&self) {
        if let Some(raw) = self.settings.legacy_token().await {
            let clear = match self.credentials.set_token(&raw).await {
                Ok(kind) => {
                    info!(kind = %kind, "Moved plaintext token into secure storage");
                    true
                }
                Err(e) if e.kind() == ErrorKind::Validation => {
                    warn!(error = %e, "Discarded unusable plaintext token");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Secure storage unavailable, keeping plaintext token");
                    false
                }
            };
            if clear {
                if let Err(e) = self.settings.clear_legacy_token().await {
                    warn!(error = %e, "Failed to remove plaintext token from settings");
                }
            }
        }

        match self.credentials.migrate().await {
            Ok(MigrationOutcome::Tagged(kind)) => debug!(kind = %kind, "Tagged stored token"),
            Ok(outcome) => debug!(?outcome, "Token migration not needed"),
            Err(e) => warn!(error = %e, "Token migration failed"),
        }
    }
}
