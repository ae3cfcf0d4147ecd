// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Packy Fetch
//!
//! Credential storage and the budget API client.
//!
//! ## Host APIs
//!
//! The [`host`] module wraps system interactions:
//!
//! - [`host::keychain`] - Secure secret storage (OS keychain, in-memory)
//! - [`host::http`] - HTTP client with tracing, timeout, and proxy
//!
//! ## Credentials and Fetching
//!
//! - [`credentials::CredentialStore`] - Validates, stores, expires and purges the credential
//! - [`api::BudgetApiClient`] - Authenticated GET, error classification, body transform
//! - [`context::FetchConfigSource`] - Where the client reads endpoint and proxy from
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use packy_fetch::{BudgetApiClient, BudgetSource, CredentialStore, StaticConfig, SystemKeychain};
//!
//! let credentials = Arc::new(CredentialStore::new(
//!     Arc::new(SystemKeychain::new()),
//!     packy_core::system_clock(),
//! ));
//! let client = BudgetApiClient::new(credentials, Arc::new(StaticConfig::default()));
//!
//! if let Some(snapshot) = client.fetch_budget_data().await? {
//!     println!("{:.1}% of today's budget used", snapshot.daily.percentage);
//! }
//! ```

pub mod api;
pub mod context;
pub mod credentials;
pub mod error;
pub mod host;

// Re-export key types at crate root

// Errors
pub use error::{HttpError, KeychainError};

// Host APIs
pub use host::{
    http::{HttpClient, HttpOptions},
    keychain::{MemoryKeychain, SecretStorage, SystemKeychain},
};

// Credentials & fetching
pub use api::{transform, BudgetApiClient, BudgetSource};
pub use context::{FetchConfigSource, FetchSettings, StaticConfig, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
pub use credentials::{
    CredentialEvent, CredentialStore, MigrationOutcome, TOKEN_KEY, TOKEN_TYPE_KEY,
};
