//! Credential lifecycle on top of secure storage.
//!
//! The raw credential and its format tag live under two keys. Reads resolve
//! the format from the tag (tagging legacy entries on first sight) and purge
//! credentials that have expired. Every operation holds one async lock, so
//! two callers racing on an expired credential produce a single purge and a
//! single [`CredentialEvent::Expired`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use packy_core::{
    token, validate_token_input, ClassifiedError, Credential, SharedClock, TokenKind,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::host::SecretStorage;

/// Storage key of the raw credential.
pub const TOKEN_KEY: &str = "packy-usage.apiToken";

/// Storage key of the credential's format tag.
pub const TOKEN_TYPE_KEY: &str = "packy-usage.tokenType";

const EVENT_CAPACITY: usize = 16;

// ============================================================================
// Events
// ============================================================================

/// Change notifications emitted by [`CredentialStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialEvent {
    /// A stored credential was found expired and purged.
    Expired,
    /// The credential was removed explicitly or after a rejection.
    Removed,
}

/// Result of [`CredentialStore::migrate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Nothing stored.
    NoToken,
    /// Credential already carried a valid tag.
    AlreadyTagged(TokenKind),
    /// Credential was untagged and has now been tagged.
    Tagged(TokenKind),
    /// Credential format could not be detected; left untouched.
    Unrecognized,
}

// ============================================================================
// Credential Store
// ============================================================================

/// Owns the stored credential.
pub struct CredentialStore {
    storage: Arc<dyn SecretStorage>,
    clock: SharedClock,
    events: broadcast::Sender<CredentialEvent>,
    op_lock: Mutex<()>,
}

impl CredentialStore {
    /// Creates a store over `storage`, reading time from `clock`.
    pub fn new(storage: Arc<dyn SecretStorage>, clock: SharedClock) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            clock,
            events,
            op_lock: Mutex::new(()),
        }
    }

    /// Subscribes to credential events.
    pub fn subscribe(&self) -> broadcast::Receiver<CredentialEvent> {
        self.events.subscribe()
    }

    /// Returns the stored credential if it is present, recognizable and live.
    ///
    /// An expired credential is purged, [`CredentialEvent::Expired`] is sent,
    /// and `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifiedError::Unknown`] if secure storage fails.
    #[instrument(skip(self))]
    pub async fn get_token(&self) -> Result<Option<Credential>, ClassifiedError> {
        let _guard = self.op_lock.lock().await;

        let Some(raw) = self.read_raw().await? else {
            return Ok(None);
        };

        let kind = match self.read_tag().await? {
            Some(kind) => kind,
            None => match token::detect(&raw) {
                Some(kind) => {
                    if let Err(e) = self.storage.set(TOKEN_TYPE_KEY, kind.tag()).await {
                        warn!(error = %e, "Failed to persist credential tag");
                    } else {
                        debug!(kind = %kind, "Tagged stored credential");
                    }
                    kind
                }
                None => {
                    warn!("Stored credential has an unrecognized format");
                    return Ok(None);
                }
            },
        };

        let credential = Credential::new(raw, kind);
        if credential.is_expired_at(self.clock.now()) {
            info!(kind = %kind, "Stored credential expired, purging");
            self.purge().await?;
            let _ = self.events.send(CredentialEvent::Expired);
            return Ok(None);
        }

        Ok(Some(credential))
    }

    /// Validates and stores a credential.
    ///
    /// The raw value is written before its tag. If the tag write fails both
    /// keys are removed again. No event is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifiedError::Validation`] for unusable input and
    /// [`ClassifiedError::Unknown`] if secure storage fails.
    #[instrument(skip(self, raw))]
    pub async fn set_token(&self, raw: &str) -> Result<TokenKind, ClassifiedError> {
        let kind = validate_token_input(raw, self.clock.now())?;

        let _guard = self.op_lock.lock().await;

        self.storage.set(TOKEN_KEY, raw).await?;
        if let Err(e) = self.storage.set(TOKEN_TYPE_KEY, kind.tag()).await {
            warn!(error = %e, "Failed to store credential tag, rolling back");
            if let Err(rollback) = self.purge().await {
                warn!(error = %rollback, "Rollback of partial credential write failed");
            }
            return Err(e.into());
        }

        info!(kind = %kind, "Credential stored");
        Ok(kind)
    }

    /// Removes the credential and its tag, then sends
    /// [`CredentialEvent::Removed`]. Removing nothing succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifiedError::Unknown`] if secure storage fails.
    #[instrument(skip(self))]
    pub async fn delete_token(&self) -> Result<(), ClassifiedError> {
        let _guard = self.op_lock.lock().await;
        self.purge().await?;
        info!("Credential removed");
        let _ = self.events.send(CredentialEvent::Removed);
        Ok(())
    }

    /// Returns true if a live credential is stored.
    ///
    /// # Errors
    ///
    /// Same as [`CredentialStore::get_token`].
    pub async fn has_token(&self) -> Result<bool, ClassifiedError> {
        Ok(self.get_token().await?.is_some())
    }

    /// Expiration instant of any raw credential.
    pub fn token_expiration(raw: &str) -> Option<DateTime<Utc>> {
        token::expiration(raw)
    }

    /// Tags a credential stored without a format tag.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifiedError::Unknown`] if secure storage fails.
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<MigrationOutcome, ClassifiedError> {
        let _guard = self.op_lock.lock().await;

        let Some(raw) = self.read_raw().await? else {
            return Ok(MigrationOutcome::NoToken);
        };
        if let Some(kind) = self.read_tag().await? {
            return Ok(MigrationOutcome::AlreadyTagged(kind));
        }

        match token::detect(&raw) {
            Some(kind) => {
                self.storage.set(TOKEN_TYPE_KEY, kind.tag()).await?;
                info!(kind = %kind, "Migrated untagged credential");
                Ok(MigrationOutcome::Tagged(kind))
            }
            None => {
                warn!("Untagged credential has an unrecognized format");
                Ok(MigrationOutcome::Unrecognized)
            }
        }
    }

    async fn read_raw(&self) -> Result<Option<String>, ClassifiedError> {
        let raw = self.storage.get(TOKEN_KEY).await?;
        Ok(raw.filter(|r| !r.is_empty()))
    }

    /// Reads the persisted tag. Unknown tags read as absent.
    async fn read_tag(&self) -> Result<Option<TokenKind>, ClassifiedError> {
        let tag = self.storage.get(TOKEN_TYPE_KEY).await?;
        Ok(tag.as_deref().and_then(TokenKind::from_tag))
    }

    async fn purge(&self) -> Result<(), ClassifiedError> {
        self.storage.delete(TOKEN_KEY).await?;
        self.storage.delete(TOKEN_TYPE_KEY).await?;
        Ok(())
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
