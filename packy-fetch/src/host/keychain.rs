//! Secure credential storage.
//!
//! [`SecretStorage`] is an opaque key-value capability. Two implementations:
//! - [`SystemKeychain`] - the OS keychain through `keyring`
//!   (macOS Keychain Services, Windows Credential Manager, Linux Secret Service)
//! - [`MemoryKeychain`] - in-process map, for tests and headless runs

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use keyring::Entry;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::KeychainError;

/// Keychain service under which every key is stored.
pub const DEFAULT_SERVICE: &str = "packy-usage";

// ============================================================================
// Secret Storage Trait
// ============================================================================

/// Async key-value store for secrets.
#[async_trait]
pub trait SecretStorage: Send + Sync {
    /// Reads a secret.
    ///
    /// # Returns
    /// * `Ok(Some(secret))` - Secret found
    /// * `Ok(None)` - No secret under `key`
    /// * `Err(e)` - Storage failure
    async fn get(&self, key: &str) -> Result<Option<String>, KeychainError>;

    /// Writes a secret, replacing any existing value.
    async fn set(&self, key: &str, secret: &str) -> Result<(), KeychainError>;

    /// Deletes a secret. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), KeychainError>;

    /// Check if a secret exists.
    async fn exists(&self, key: &str) -> bool {
        matches!(self.get(key).await, Ok(Some(_)))
    }
}

// ============================================================================
// System Keychain Implementation
// ============================================================================

/// OS keychain backed storage.
#[derive(Debug, Clone)]
pub struct SystemKeychain {
    service: String,
}

impl SystemKeychain {
    /// Creates a keychain scoped to [`DEFAULT_SERVICE`].
    pub fn new() -> Self {
        Self::with_service(DEFAULT_SERVICE)
    }

    /// Creates a keychain scoped to a custom service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Service name entries are stored under.
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service, key).map_err(|e| KeychainError::Platform(e.to_string()))
    }
}

impl Default for SystemKeychain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStorage for SystemKeychain {
    async fn get(&self, key: &str) -> Result<Option<String>, KeychainError> {
        debug!(service = %self.service, key = %key, "Reading secret from keychain");

        match self.entry(key)?.get_password() {
            Ok(secret) if secret.is_empty() => Ok(None),
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => {
                debug!(key = %key, "Secret not found");
                Ok(None)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read secret");
                Err(e.into())
            }
        }
    }

    async fn set(&self, key: &str, secret: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service, key = %key, "Writing secret to keychain");

        self.entry(key)?.set_password(secret).map_err(|e| {
            warn!(key = %key, error = %e, "Failed to write secret");
            KeychainError::from(e)
        })
    }

    async fn delete(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service, key = %key, "Deleting secret from keychain");

        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to delete secret");
                Err(e.into())
            }
        }
    }
}

// ============================================================================
// Memory Keychain Implementation
// ============================================================================

/// In-memory storage.
///
/// Writes to keys registered with [`MemoryKeychain::fail_writes_to`] return
/// an error, which lets callers exercise partial-failure paths.
#[derive(Debug, Default)]
pub struct MemoryKeychain {
    entries: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryKeychain {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `set` on `key` fail.
    pub async fn fail_writes_to(&self, key: &str) {
        self.failing.lock().await.insert(key.to_string());
    }

    /// Number of stored secrets.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl SecretStorage for MemoryKeychain {
    async fn get(&self, key: &str) -> Result<Option<String>, KeychainError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, secret: &str) -> Result<(), KeychainError> {
        if self.failing.lock().await.contains(key) {
            return Err(KeychainError::Unavailable(format!("write to {key} rejected")));
        }
        self.entries
            .lock()
            .await
            .insert(key.to_string(), secret.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KeychainError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
