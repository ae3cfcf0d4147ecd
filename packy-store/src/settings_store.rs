//! User settings store.
//!
//! Manages settings with persistence and change notification. The store is
//! also the [`FetchConfigSource`] the API client reads from, so a saved
//! endpoint or proxy change applies to the next fetch.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use packy_fetch::{FetchConfigSource, FetchSettings, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::StoreError;
use crate::persistence::{default_settings_path, load_json, save_json};
use crate::scheduler::FreshnessPolicy;

/// Default polling interval in milliseconds.
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 30_000;

/// Smallest accepted polling interval in milliseconds.
pub const MIN_POLLING_INTERVAL_MS: u64 = 5_000;

/// Environment variables consulted, in order, when no proxy is configured.
pub const PROXY_ENV_VARS: [&str; 4] = ["HTTPS_PROXY", "HTTP_PROXY", "https_proxy", "http_proxy"];

// ============================================================================
// Settings
// ============================================================================

/// User settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Budget endpoint URL.
    pub api_endpoint: String,

    /// Polling interval in milliseconds.
    pub polling_interval_ms: u64,

    /// Whether the watch loop polls at all.
    pub enable_polling: bool,

    /// Proxy URL. Empty falls back to the environment.
    pub proxy: String,

    /// Send the credential as a `token` cookie too.
    pub mirror_cookie: bool,

    /// Skip a scheduled fetch while the cache is still fresh.
    pub skip_when_fresh: bool,

    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Plaintext token from older releases. Moved into secure storage on
    /// startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_ENDPOINT.to_string(),
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            enable_polling: true,
            proxy: String::new(),
            mirror_cookie: true,
            skip_when_fresh: false,
            request_timeout_ms: u64::try_from(DEFAULT_TIMEOUT.as_millis()).unwrap_or(10_000),
            api_token: None,
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_endpoint", &self.api_endpoint)
            .field("polling_interval_ms", &self.polling_interval_ms)
            .field("enable_polling", &self.enable_polling)
            .field("proxy", &self.proxy)
            .field("mirror_cookie", &self.mirror_cookie)
            .field("skip_when_fresh", &self.skip_when_fresh)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Settings {
    /// Polling interval.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Scheduler freshness policy.
    pub fn freshness_policy(&self) -> FreshnessPolicy {
        if self.skip_when_fresh {
            FreshnessPolicy::SkipWhenFresh
        } else {
            FreshnessPolicy::AlwaysFetch
        }
    }

    /// Effective proxy: the configured one, else the first proxy variable set
    /// in the process environment.
    pub fn resolve_proxy(&self) -> Option<String> {
        self.resolve_proxy_with(|name| std::env::var(name).ok())
    }

    /// Like [`Settings::resolve_proxy`] with a custom environment lookup.
    pub fn resolve_proxy_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        let configured = self.proxy.trim();
        if !configured.is_empty() {
            return Some(configured.to_string());
        }

        PROXY_ENV_VARS
            .iter()
            .filter_map(|name| env(*name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    /// Settings for the API client.
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            endpoint: self.api_endpoint.trim().to_string(),
            proxy: self.resolve_proxy(),
            mirror_cookie: self.mirror_cookie,
            timeout: self.request_timeout(),
        }
    }

    /// Lists configuration problems. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if Url::parse(self.api_endpoint.trim()).is_err() {
            problems.push(format!("API endpoint is not a valid URL: {:?}", self.api_endpoint));
        }
        if self.polling_interval_ms < MIN_POLLING_INTERVAL_MS {
            problems.push(format!(
                "polling interval must be at least {MIN_POLLING_INTERVAL_MS}ms (got {}ms)",
                self.polling_interval_ms
            ));
        }
        if self.request_timeout_ms == 0 {
            problems.push("request timeout must be greater than zero".to_string());
        }
        let proxy = self.proxy.trim();
        if !proxy.is_empty() && Url::parse(proxy).is_err() {
            problems.push(format!("proxy is not a valid URL: {proxy:?}"));
        }

        problems
    }

    /// Returns true if [`Settings::validate`] finds nothing.
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let proxy = match (self.proxy.trim(), self.resolve_proxy()) {
            ("", Some(env)) => format!("{env} (from environment)"),
            ("", None) => "none".to_string(),
            (configured, _) => configured.to_string(),
        };
        let on_off = |b: bool| if b { "on" } else { "off" };

        format!(
            "API endpoint:     {}\n\
             Polling:          {} (every {}ms)\n\
             Proxy:            {}\n\
             Cookie mirroring: {}\n\
             Skip when fresh:  {}\n\
             Request timeout:  {}ms",
            self.api_endpoint,
            if self.enable_polling { "enabled" } else { "disabled" },
            self.polling_interval_ms,
            proxy,
            on_off(self.mirror_cookie),
            on_off(self.skip_when_fresh),
            self.request_timeout_ms,
        )
    }

    /// Copy for display output with the legacy plaintext token removed.
    pub fn without_secrets(&self) -> Settings {
        Settings {
            api_token: None,
            ..self.clone()
        }
    }

    /// Restores the endpoint and polling settings to their defaults.
    pub fn reset_to_defaults(&mut self) {
        let defaults = Settings::default();
        self.api_endpoint = defaults.api_endpoint;
        self.polling_interval_ms = defaults.polling_interval_ms;
        self.enable_polling = defaults.enable_polling;
    }

    /// Sets one field from its CLI key and string value.
    ///
    /// Keys: `endpoint`, `interval`, `polling`, `proxy`, `cookie`,
    /// `skip-when-fresh`, `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownKey`] or [`StoreError::InvalidValue`].
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let invalid = |reason: &str| StoreError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match key {
            "endpoint" => {
                Url::parse(value.trim()).map_err(|e| invalid(&e.to_string()))?;
                self.api_endpoint = value.trim().to_string();
            }
            "interval" => {
                let ms: u64 = value.trim().parse().map_err(|_| invalid("expected milliseconds"))?;
                if ms < MIN_POLLING_INTERVAL_MS {
                    return Err(invalid(&format!("must be at least {MIN_POLLING_INTERVAL_MS}")));
                }
                self.polling_interval_ms = ms;
            }
            "timeout" => {
                let ms: u64 = value.trim().parse().map_err(|_| invalid("expected milliseconds"))?;
                if ms == 0 {
                    return Err(invalid("must be greater than zero"));
                }
                self.request_timeout_ms = ms;
            }
            "polling" => self.enable_polling = parse_bool(value).ok_or_else(|| invalid("expected on/off"))?,
            "cookie" => self.mirror_cookie = parse_bool(value).ok_or_else(|| invalid("expected on/off"))?,
            "skip-when-fresh" => {
                self.skip_when_fresh = parse_bool(value).ok_or_else(|| invalid("expected on/off"))?;
            }
            "proxy" => {
                let proxy = value.trim();
                if !proxy.is_empty() {
                    Url::parse(proxy).map_err(|e| invalid(&e.to_string()))?;
                }
                self.proxy = proxy.to_string();
            }
            other => return Err(StoreError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Settings Store
// ============================================================================

/// Persistent settings store with change notifications.
pub struct SettingsStore {
    settings: RwLock<Settings>,
    path: PathBuf,
    notify: watch::Sender<u64>,
}

impl SettingsStore {
    /// Creates a store holding defaults, backed by `path`.
    pub fn new(path: PathBuf) -> Self {
        Self::with_settings(path, Settings::default())
    }

    /// Creates a store holding `settings`, backed by `path`.
    pub fn with_settings(path: PathBuf, settings: Settings) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            settings: RwLock::new(settings),
            path,
            notify,
        }
    }

    /// Loads settings from the default path.
    ///
    /// # Errors
    ///
    /// Returns error if the settings file exists but cannot be read.
    pub async fn load_default() -> Result<Self, StoreError> {
        Self::load(default_settings_path()).await
    }

    /// Loads settings from a path. A missing file yields defaults; a file
    /// that does not parse is logged and replaced by defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read.
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let settings = if tokio::fs::try_exists(&path).await? {
            info!(path = %path.display(), "Loading settings");
            match load_json(&path).await {
                Ok(settings) => settings,
                Err(StoreError::Io(e)) => return Err(StoreError::Io(e)),
                Err(e) => {
                    warn!(error = %e, "Failed to parse settings, using defaults");
                    Settings::default()
                }
            }
        } else {
            debug!(path = %path.display(), "Settings file not found, using defaults");
            Settings::default()
        };

        Ok(Self::with_settings(path, settings))
    }

    /// Path the store saves to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets a copy of the current settings.
    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Updates settings and notifies subscribers.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        {
            let mut settings = self.settings.write().await;
            f(&mut settings);
        }
        self.notify_change();
    }

    /// Applies a fallible update. Nothing changes and no one is notified if
    /// `f` fails.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    pub async fn try_update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Settings) -> Result<(), StoreError>,
    {
        {
            let mut settings = self.settings.write().await;
            let mut draft = settings.clone();
            f(&mut draft)?;
            *settings = draft;
        }
        self.notify_change();
        Ok(())
    }

    /// Saves settings to disk.
    ///
    /// # Errors
    ///
    /// Returns error if settings cannot be written to disk.
    pub async fn save(&self) -> Result<(), StoreError> {
        let settings = self.settings.read().await;
        save_json(&self.path, &*settings).await?;
        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    /// Re-reads the settings file, picking up edits made by other
    /// processes. A missing file reads as defaults. Subscribers are notified
    /// only if something changed.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed. The held
    /// settings are left as they were.
    pub async fn reload(&self) -> Result<bool, StoreError> {
        let fresh: Settings = if tokio::fs::try_exists(&self.path).await? {
            load_json(&self.path).await?
        } else {
            Settings::default()
        };

        {
            let mut settings = self.settings.write().await;
            if *settings == fresh {
                return Ok(false);
            }
            *settings = fresh;
        }
        debug!(path = %self.path.display(), "Settings reloaded");
        self.notify_change();
        Ok(true)
    }

    /// Restores the endpoint and polling defaults, saves, and notifies.
    ///
    /// # Errors
    ///
    /// Returns error if settings cannot be written to disk.
    pub async fn reset_to_defaults(&self) -> Result<(), StoreError> {
        self.update(Settings::reset_to_defaults).await;
        self.save().await
    }

    /// Legacy plaintext token from older releases, if a non-blank one is
    /// present. The settings are left untouched.
    pub async fn legacy_token(&self) -> Option<String> {
        self.settings
            .read()
            .await
            .api_token
            .clone()
            .filter(|t| !t.trim().is_empty())
    }

    /// Removes the legacy plaintext token and rewrites the settings file.
    /// Returns false without touching the file if no token was present.
    ///
    /// # Errors
    ///
    /// Returns error if settings cannot be written to disk.
    pub async fn clear_legacy_token(&self) -> Result<bool, StoreError> {
        if self.settings.write().await.api_token.take().is_none() {
            return Ok(false);
        }

        self.save().await?;
        self.notify_change();
        info!("Removed legacy plaintext token from settings");
        Ok(true)
    }

    /// Subscribes to settings changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    fn notify_change(&self) {
        self.notify.send_modify(|version| *version += 1);
    }
}

#[async_trait]
impl FetchConfigSource for SettingsStore {
    async fn fetch_settings(&self) -> FetchSettings {
        self.settings.read().await.fetch_settings()
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.api_endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.polling_interval_ms, 30_000);
        assert!(settings.enable_polling);
        assert!(settings.mirror_cookie);
        assert!(!settings.skip_when_fresh);
        assert_eq!(settings.request_timeout_ms, 10_000);
        assert_eq!(settings.freshness_policy(), FreshnessPolicy::AlwaysFetch);
        assert!(settings.is_valid());
    }

    #[test]
    fn test_configured_proxy_wins() {
        let settings = Settings {
            proxy: "  http://configured:8080  ".to_string(),
            ..Default::default()
        };
        let env = |_: &str| Some("http://env:3128".to_string());
        assert_eq!(
            settings.resolve_proxy_with(env).as_deref(),
            Some("http://configured:8080")
        );
    }

    #[test]
    fn test_proxy_env_fallback_order() {
        let settings = Settings::default();
        let env = |name: &str| match name {
            "HTTP_PROXY" => Some("http://upper:1".to_string()),
            "https_proxy" => Some("http://lower:2".to_string()),
            _ => None,
        };
        assert_eq!(settings.resolve_proxy_with(env).as_deref(), Some("http://upper:1"));
        assert_eq!(settings.resolve_proxy_with(no_env), None);
    }

    #[test]
    fn test_blank_env_proxy_is_skipped() {
        let settings = Settings::default();
        let env = |name: &str| match name {
            "HTTPS_PROXY" => Some("   ".to_string()),
            "http_proxy" => Some("http://fallback:3".to_string()),
            _ => None,
        };
        assert_eq!(settings.resolve_proxy_with(env).as_deref(), Some("http://fallback:3"));
    }

    #[test]
    fn test_validate_reports_problems() {
        let settings = Settings {
            api_endpoint: "not a url".to_string(),
            polling_interval_ms: 1_000,
            ..Default::default()
        };
        let problems = settings.validate();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("not a valid URL"));
        assert!(problems[1].contains("at least 5000ms"));
    }

    #[test]
    fn test_reset_keeps_unrelated_fields() {
        let mut settings = Settings {
            api_endpoint: "http://elsewhere".to_string(),
            polling_interval_ms: 60_000,
            enable_polling: false,
            proxy: "http://proxy:1".to_string(),
            ..Default::default()
        };
        settings.reset_to_defaults();

        assert_eq!(settings.api_endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.polling_interval_ms, DEFAULT_POLLING_INTERVAL_MS);
        assert!(settings.enable_polling);
        assert_eq!(settings.proxy, "http://proxy:1");
    }

    #[test]
    fn test_set_field() {
        let mut settings = Settings::default();
        settings.set_field("interval", "60000").unwrap();
        settings.set_field("polling", "off").unwrap();
        settings.set_field("cookie", "no").unwrap();
        settings.set_field("skip-when-fresh", "yes").unwrap();
        settings.set_field("endpoint", "http://localhost:9000/info").unwrap();
        settings.set_field("proxy", "").unwrap();

        assert_eq!(settings.polling_interval_ms, 60_000);
        assert!(!settings.enable_polling);
        assert!(!settings.mirror_cookie);
        assert_eq!(settings.freshness_policy(), FreshnessPolicy::SkipWhenFresh);
        assert_eq!(settings.api_endpoint, "http://localhost:9000/info");
    }

    #[test]
    fn test_set_field_rejects_bad_input() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set_field("interval", "100"),
            Err(StoreError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set_field("polling", "maybe"),
            Err(StoreError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set_field("colour", "red"),
            Err(StoreError::UnknownKey(_))
        ));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_summary_mentions_fields() {
        let summary = Settings::default().summary();
        assert!(summary.contains(DEFAULT_ENDPOINT));
        assert!(summary.contains("every 30000ms"));
        assert!(summary.contains("Cookie mirroring: on"));
    }

    #[test]
    fn test_debug_redacts_legacy_token() {
        let settings = Settings {
            api_token: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn test_display_copy_drops_legacy_token() {
        let settings = Settings {
            api_token: Some("sk-secret".to_string()),
            polling_interval_ms: 45_000,
            ..Default::default()
        };
        let shown = settings.without_secrets();
        assert_eq!(shown.polling_interval_ms, 45_000);
        let json = serde_json::to_string(&shown).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(!json.contains("api_token"));
        // The original keeps the token for migration.
        assert_eq!(settings.api_token.as_deref(), Some("sk-secret"));
    }

    #[tokio::test]
    async fn test_update_notifies_subscribers() {
        let store = SettingsStore::new(PathBuf::from("unused.json"));
        let rx = store.subscribe();

        store.update(|s| s.enable_polling = false).await;

        assert!(rx.has_changed().unwrap());
        assert!(!store.get().await.enable_polling);
    }

    #[tokio::test]
    async fn test_failed_update_changes_nothing() {
        let store = SettingsStore::new(PathBuf::from("unused.json"));
        let rx = store.subscribe();

        let result = store.try_update(|s| s.set_field("interval", "10")).await;
        assert!(result.is_err());
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.get().await, Settings::default());
    }

    #[tokio::test]
    async fn test_store_is_a_config_source() {
        let store = SettingsStore::with_settings(
            PathBuf::from("unused.json"),
            Settings {
                api_endpoint: " http://localhost/info ".to_string(),
                proxy: "http://proxy:8080".to_string(),
                mirror_cookie: false,
                request_timeout_ms: 2_500,
                ..Default::default()
            },
        );

        let fetch = store.fetch_settings().await;
        assert_eq!(fetch.endpoint, "http://localhost/info");
        assert_eq!(fetch.proxy.as_deref(), Some("http://proxy:8080"));
        assert!(!fetch.mirror_cookie);
        assert_eq!(fetch.timeout, Duration::from_millis(2_500));
    }
}
