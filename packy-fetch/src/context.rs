//! Fetch settings and the source they are read from.
//!
//! The API client reads [`FetchSettings`] through a [`FetchConfigSource`] on
//! every call, so changes to the endpoint or proxy take effect on the next
//! fetch without rebuilding the client.

use std::time::Duration;

use async_trait::async_trait;

use crate::host::HttpOptions;

/// Default budget endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://www.packycode.com/api/backend/users/info";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

// ============================================================================
// Fetch Settings
// ============================================================================

/// Settings for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Budget endpoint. Empty means not configured.
    pub endpoint: String,
    /// Resolved proxy URL, if any.
    pub proxy: Option<String>,
    /// Whether to send the credential as a `token` cookie as well.
    pub mirror_cookie: bool,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            proxy: None,
            mirror_cookie: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl FetchSettings {
    /// Creates settings for a custom endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Sets the proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables cookie mirroring.
    #[must_use]
    pub fn mirror_cookie(mut self, enabled: bool) -> Self {
        self.mirror_cookie = enabled;
        self
    }

    /// Returns true if an endpoint is set.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    /// HTTP client options derived from these settings.
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: self.timeout,
            proxy: self.proxy.clone(),
        }
    }
}

// ============================================================================
// Config Source
// ============================================================================

/// Provides current fetch settings.
#[async_trait]
pub trait FetchConfigSource: Send + Sync {
    /// Returns the settings in effect right now.
    async fn fetch_settings(&self) -> FetchSettings;
}

/// Config source that never changes.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig(pub FetchSettings);

#[async_trait]
impl FetchConfigSource for StaticConfig {
    async fn fetch_settings(&self) -> FetchSettings {
        self.0.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
