//! Token command - store, remove and inspect the API token.

use std::io::{IsTerminal, Read};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use tracing::info;

use super::Services;
use crate::output::{JsonFormatter, TextFormatter, TokenStatus};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the token command.
#[derive(Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub action: TokenAction,
}

/// Token subcommands.
#[derive(Subcommand)]
pub enum TokenAction {
    /// Store a token. Reads stdin when the argument is omitted.
    Set {
        /// API key (sk-...) or JWT.
        token: Option<String>,
    },

    /// Remove the stored token.
    Clear,

    /// Show the stored token's kind and expiration.
    Status,
}

/// Runs the token command.
pub async fn run(args: &TokenArgs, cli: &Cli) -> Result<ExitCode> {
    let services = Services::open(cli).await?;

    match &args.action {
        TokenAction::Set { token } => {
            let raw = match token {
                Some(token) => token.clone(),
                None => read_stdin()?,
            };
            set_token(&services, &raw, cli).await
        }
        TokenAction::Clear => clear_token(&services, cli).await,
        TokenAction::Status => show_status(&services, cli).await,
    }
}

fn read_stdin() -> Result<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprintln!("Paste your API key (sk-...) or JWT, then press Ctrl+D:");
    }
    let mut raw = String::new();
    stdin.read_to_string(&mut raw).context("Failed to read token from stdin")?;
    Ok(raw)
}

async fn set_token(services: &Services, raw: &str, cli: &Cli) -> Result<ExitCode> {
    // Stdin input carries a trailing newline.
    let kind = services.credentials.set_token(raw.trim()).await?;
    services.cache.invalidate_cache().await;
    info!(kind = %kind, "Token stored");

    if !cli.quiet {
        let credential = services.credentials.get_token().await?;
        print_status(&TokenStatus::of(credential.as_ref(), Utc::now()), cli)?;
    }
    Ok(ExitCode::Success)
}

async fn clear_token(services: &Services, cli: &Cli) -> Result<ExitCode> {
    services.credentials.delete_token().await?;
    services.cache.invalidate_cache().await;
    info!("Token removed");

    if !cli.quiet {
        print_status(&TokenStatus::default(), cli)?;
    }
    Ok(ExitCode::Success)
}

async fn show_status(services: &Services, cli: &Cli) -> Result<ExitCode> {
    let credential = services.credentials.get_token().await?;
    let status = TokenStatus::of(credential.as_ref(), Utc::now());
    print_status(&status, cli)?;

    if status.kind.is_some() {
        Ok(ExitCode::Success)
    } else {
        Ok(ExitCode::NotConfigured)
    }
}

fn print_status(status: &TokenStatus, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            println!("{}", TextFormatter::new(!cli.no_color).format_token_status(status));
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format_token_status(status)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use clap::Parser;
    use packy_core::{ErrorKind, TokenKind};
    use packy_fetch::{MemoryKeychain, SecretStorage, TOKEN_KEY, TOKEN_TYPE_KEY};
    use packy_store::SettingsStore;
    use tempfile::TempDir;

    fn quiet_cli() -> Cli {
        Cli::parse_from(["packy", "--quiet"])
    }

    fn services(storage: Arc<MemoryKeychain>) -> (Services, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let settings = SettingsStore::new(temp_dir.path().join("settings.json"));
        (Services::with_storage(settings, storage), temp_dir)
    }

    #[tokio::test]
    async fn test_set_token_stores_tagged() {
        let storage = Arc::new(MemoryKeychain::new());
        let (services, _dir) = services(storage.clone());

        let code = set_token(&services, "  sk-abc123  ", &quiet_cli()).await.unwrap();

        assert_eq!(code, ExitCode::Success);
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap().as_deref(), Some("sk-abc123"));
        assert_eq!(storage.get(TOKEN_TYPE_KEY).await.unwrap().as_deref(), Some("apikey"));
    }

    #[tokio::test]
    async fn test_set_token_rejects_invalid() {
        let storage = Arc::new(MemoryKeychain::new());
        let (services, _dir) = services(storage.clone());

        let err = set_token(&services, "not-a-token", &quiet_cli()).await.unwrap_err();
        let classified = err.downcast_ref::<packy_core::ClassifiedError>().unwrap();

        assert_eq!(classified.kind(), ErrorKind::Validation);
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_token_rejects_expired_jwt() {
        let storage = Arc::new(MemoryKeychain::new());
        let (services, _dir) = services(storage.clone());
        let jwt = crate::test_support::jwt_expiring_at(1_000);

        let err = set_token(&services, &jwt, &quiet_cli()).await.unwrap_err();

        assert!(err.to_string().contains("expired"));
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_token() {
        let storage = Arc::new(MemoryKeychain::new());
        storage.set(TOKEN_KEY, "sk-abc").await.unwrap();
        storage.set(TOKEN_TYPE_KEY, "apikey").await.unwrap();
        let (services, _dir) = services(storage.clone());

        clear_token(&services, &quiet_cli()).await.unwrap();
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_token_status_of_live_jwt() {
        let storage = Arc::new(MemoryKeychain::new());
        let (services, _dir) = services(storage);
        let exp = Utc::now().timestamp() + 3_600;
        services
            .credentials
            .set_token(&crate::test_support::jwt_expiring_at(exp))
            .await
            .unwrap();

        let credential = services.credentials.get_token().await.unwrap();
        let status = TokenStatus::of(credential.as_ref(), Utc::now());

        assert_eq!(status.kind, Some(TokenKind::Jwt));
        assert_eq!(status.expires_at.map(|at| at.timestamp()), Some(exp));
        assert!(!status.expired);
    }
}
