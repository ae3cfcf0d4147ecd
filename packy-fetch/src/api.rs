//! Budget API client.
//!
//! One authenticated GET per call. Responses are classified into
//! [`ClassifiedError`] kinds and successful bodies are mapped into a
//! [`BudgetSnapshot`].

use std::sync::Arc;

use async_trait::async_trait;
use packy_core::{BudgetPeriod, BudgetSnapshot, ClassifiedError, Credential};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::context::{FetchConfigSource, FetchSettings};
use crate::credentials::CredentialStore;
use crate::host::HttpClient;

// ============================================================================
// Budget Source Trait
// ============================================================================

/// Anything that can produce a budget snapshot.
#[async_trait]
pub trait BudgetSource: Send + Sync {
    /// Fetches the latest budget figures.
    ///
    /// `Ok(None)` means no credential or endpoint is configured.
    async fn fetch_budget_data(&self) -> Result<Option<BudgetSnapshot>, ClassifiedError>;
}

// ============================================================================
// API Client
// ============================================================================

/// Client for the remote budget endpoint.
pub struct BudgetApiClient {
    credentials: Arc<CredentialStore>,
    config: Arc<dyn FetchConfigSource>,
    http: Mutex<Option<HttpClient>>,
}

impl BudgetApiClient {
    /// Creates a client.
    pub fn new(credentials: Arc<CredentialStore>, config: Arc<dyn FetchConfigSource>) -> Self {
        Self {
            credentials,
            config,
            http: Mutex::new(None),
        }
    }

    /// Returns a client matching the current timeout and proxy, rebuilding
    /// it when either changed.
    async fn client_for(&self, settings: &FetchSettings) -> Result<HttpClient, ClassifiedError> {
        let options = settings.http_options();
        let mut slot = self.http.lock().await;

        if let Some(client) = slot.as_ref().filter(|c| *c.options() == options) {
            return Ok(client.clone());
        }

        debug!(proxy = ?options.proxy, timeout = ?options.timeout, "Building HTTP client");
        let client = HttpClient::new(options)?;
        *slot = Some(client.clone());
        Ok(client)
    }

    async fn request(
        &self,
        settings: &FetchSettings,
        credential: &Credential,
    ) -> Result<BudgetSnapshot, ClassifiedError> {
        let client = self.client_for(settings).await?;
        let headers = request_headers(credential, settings.mirror_cookie)?;

        let response = client
            .get_with_headers(&settings.endpoint, headers)
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = status.as_u16(), "Credential rejected, purging");
            if let Err(e) = self.credentials.delete_token().await {
                warn!(error = %e, "Failed to purge rejected credential");
            }
            return Err(ClassifiedError::auth(format!(
                "authentication failed ({}): {}",
                status.as_u16(),
                reason(status)
            )));
        }
        if !status.is_success() {
            return Err(ClassifiedError::api(format!(
                "request failed ({}): {}",
                status.as_u16(),
                reason(status)
            )));
        }

        let body = response.text().await.map_err(classify_transport)?;
        let raw: Value = serde_json::from_str(&body)?;
        Ok(transform(&raw))
    }
}

#[async_trait]
impl BudgetSource for BudgetApiClient {
    #[instrument(skip(self))]
    async fn fetch_budget_data(&self) -> Result<Option<BudgetSnapshot>, ClassifiedError> {
        // Read the credential first so an expired token is purged even
        // without an endpoint.
        let Some(credential) = self.credentials.get_token().await? else {
            debug!("No credential stored, skipping fetch");
            return Ok(None);
        };

        let settings = self.config.fetch_settings().await;
        if !settings.is_configured() {
            debug!("No endpoint configured, skipping fetch");
            return Ok(None);
        }

        let snapshot = self.request(&settings, &credential).await?;
        debug!(
            daily_pct = snapshot.daily.percentage,
            monthly_pct = snapshot.monthly.percentage,
            "Budget fetched"
        );
        Ok(Some(snapshot))
    }
}

impl std::fmt::Debug for BudgetApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetApiClient").finish_non_exhaustive()
    }
}

// ============================================================================
// Request Helpers
// ============================================================================

fn request_headers(credential: &Credential, mirror_cookie: bool) -> Result<HeaderMap, ClassifiedError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, sensitive(&credential.bearer())?);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if mirror_cookie {
        headers.insert(
            header::COOKIE,
            sensitive(&format!("token={}", credential.raw()))?,
        );
    }
    Ok(headers)
}

fn sensitive(value: &str) -> Result<HeaderValue, ClassifiedError> {
    let mut header = HeaderValue::from_str(value).map_err(|e| {
        ClassifiedError::validation("credential contains characters not allowed in a header")
            .with_source(e)
    })?;
    header.set_sensitive(true);
    Ok(header)
}

fn classify_transport(err: reqwest::Error) -> ClassifiedError {
    if err.is_timeout() {
        ClassifiedError::network("request timeout").with_source(err)
    } else if err.is_builder() {
        ClassifiedError::unknown("invalid endpoint URL").with_source(err)
    } else {
        ClassifiedError::network("network connection failed").with_source(err)
    }
}

fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown Status")
}

// ============================================================================
// Response Transform
// ============================================================================

/// Maps a raw response body into a snapshot.
///
/// Budget fields are coerced to numbers and default to zero. `opus_enabled`
/// is read by truthiness. Other fields are ignored.
pub fn transform(body: &Value) -> BudgetSnapshot {
    let number = |field: &str| body.get(field).map_or(0.0, coerce_number);

    BudgetSnapshot::new(
        BudgetPeriod::new(number("daily_spent_usd"), number("daily_budget_usd")),
        BudgetPeriod::new(number("monthly_spent_usd"), number("monthly_budget_usd")),
        body.get("opus_enabled").is_some_and(is_truthy),
    )
}

fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() { n } else { 0.0 }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticConfig;
    use crate::credentials::{CredentialEvent, TOKEN_KEY};
    use crate::host::{MemoryKeychain, SecretStorage};
    use crate::test_support::jwt_expiring_at;
    use packy_core::{system_clock, ErrorKind, OpusStatus};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        client: BudgetApiClient,
        credentials: Arc<CredentialStore>,
        storage: Arc<MemoryKeychain>,
    }

    async fn harness(settings: FetchSettings, token: Option<&str>) -> Harness {
        let storage = Arc::new(MemoryKeychain::new());
        let credentials = Arc::new(CredentialStore::new(storage.clone(), system_clock()));
        if let Some(token) = token {
            credentials.set_token(token).await.unwrap();
        }
        let client = BudgetApiClient::new(credentials.clone(), Arc::new(StaticConfig(settings)));
        Harness {
            client,
            credentials,
            storage,
        }
    }

    fn settings_for(server: &MockServer) -> FetchSettings {
        FetchSettings::with_endpoint(format!("{}/api/backend/users/info", server.uri()))
    }

    #[test]
    fn test_transform_scenario_body() {
        let body = json!({
            "daily_budget_usd": 100,
            "daily_spent_usd": 25,
            "monthly_budget_usd": 0,
            "monthly_spent_usd": 10,
            "opus_enabled": true
        });

        let snapshot = transform(&body);
        assert_eq!(snapshot.daily, BudgetPeriod { used: 25.0, total: 100.0, percentage: 25.0 });
        assert_eq!(snapshot.monthly, BudgetPeriod { used: 10.0, total: 0.0, percentage: 0.0 });
        assert_eq!(snapshot.opus, OpusStatus { enabled: true });
    }

    #[test]
    fn test_transform_coerces_loose_values() {
        let body = json!({
            "daily_budget_usd": "200.5",
            "daily_spent_usd": "abc",
            "monthly_budget_usd": null,
            "monthly_spent_usd": true,
            "opus_enabled": 0,
            "username": "someone"
        });

        let snapshot = transform(&body);
        assert!((snapshot.daily.total - 200.5).abs() < f64::EPSILON);
        assert_eq!(snapshot.daily.used, 0.0);
        assert_eq!(snapshot.monthly.total, 0.0);
        assert_eq!(snapshot.monthly.used, 1.0);
        assert!(!snapshot.opus.enabled);
    }

    #[test]
    fn test_transform_empty_and_non_object_bodies() {
        assert_eq!(transform(&json!({})), BudgetSnapshot::default());
        assert_eq!(transform(&json!([1, 2, 3])), BudgetSnapshot::default());
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!("yes")));
        assert!(is_truthy(&json!(1)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&Value::Null));
    }

    #[tokio::test]
    async fn test_fetch_success_sends_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/backend/users/info"))
            .and(header("authorization", "Bearer sk-abc123"))
            .and(header("content-type", "application/json"))
            .and(header("cookie", "token=sk-abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "daily_budget_usd": 50,
                "daily_spent_usd": 10,
                "monthly_budget_usd": 500,
                "monthly_spent_usd": 400,
                "opus_enabled": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(settings_for(&server), Some("sk-abc123")).await;
        let snapshot = h.client.fetch_budget_data().await.unwrap().unwrap();

        assert!((snapshot.daily.percentage - 20.0).abs() < f64::EPSILON);
        assert!((snapshot.monthly.percentage - 80.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_cookie_omitted_when_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let settings = settings_for(&server).mirror_cookie(false);
        let h = harness(settings, Some("sk-abc123")).await;
        h.client.fetch_budget_data().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("cookie"));
    }

    #[tokio::test]
    async fn test_forbidden_purges_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let h = harness(settings_for(&server), Some("sk-abc123")).await;
        let mut events = h.credentials.subscribe();

        let err = h.client.fetch_budget_data().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(err.message().contains("403"));
        assert!(err.message().contains("Forbidden"));

        assert!(h.credentials.get_token().await.unwrap().is_none());
        assert!(!h.storage.exists(TOKEN_KEY).await);
        assert_eq!(events.try_recv().unwrap(), CredentialEvent::Removed);
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let h = harness(settings_for(&server), Some("sk-abc123")).await;
        let err = h.client.fetch_budget_data().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(h.storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let h = harness(settings_for(&server), Some("sk-abc123")).await;
        let err = h.client.fetch_budget_data().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert!(err.message().contains("500"));
        // Non-auth failures leave the credential alone.
        assert!(h.credentials.has_token().await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_body_is_unknown_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let h = harness(settings_for(&server), Some("sk-abc123")).await;
        let err = h.client.fetch_budget_data().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.message(), "invalid response body");
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let settings = settings_for(&server).timeout(Duration::from_millis(50));
        let h = harness(settings, Some("sk-abc123")).await;
        let err = h.client.fetch_budget_data().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.message(), "request timeout");
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        // Bind then drop a listener so the port refuses connections.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let settings = FetchSettings::with_endpoint(format!("http://127.0.0.1:{port}/info"));

        let h = harness(settings, Some("sk-abc123")).await;
        let err = h.client.fetch_budget_data().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.message(), "network connection failed");
    }

    #[tokio::test]
    async fn test_not_configured_returns_none() {
        let server = MockServer::start().await;

        let h = harness(settings_for(&server), None).await;
        assert!(h.client.fetch_budget_data().await.unwrap().is_none());

        let h = harness(FetchSettings::with_endpoint(""), Some("sk-abc123")).await;
        assert!(h.client.fetch_budget_data().await.unwrap().is_none());

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_token_purged_without_endpoint() {
        let h = harness(FetchSettings::with_endpoint(""), None).await;
        let expired = jwt_expiring_at(chrono::Utc::now().timestamp() - 60);
        h.storage.set(TOKEN_KEY, &expired).await.unwrap();
        let mut events = h.credentials.subscribe();

        assert!(h.client.fetch_budget_data().await.unwrap().is_none());

        assert!(h.storage.is_empty().await);
        assert_eq!(events.try_recv().unwrap(), CredentialEvent::Expired);
    }

    #[tokio::test]
    async fn test_request_goes_through_configured_proxy() {
        let proxy = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "daily_budget_usd": 20,
                "daily_spent_usd": 10
            })))
            .expect(1)
            .mount(&proxy)
            .await;

        let settings = FetchSettings::with_endpoint("http://budget.invalid/info").proxy(proxy.uri());
        let h = harness(settings, Some("sk-abc123")).await;
        let snapshot = h.client.fetch_budget_data().await.unwrap().unwrap();
        assert!((snapshot.daily.percentage - 50.0).abs() < f64::EPSILON);

        let requests = proxy.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.as_str(), "http://budget.invalid/info");
        assert_eq!(
            requests[0].headers.get("authorization").unwrap(),
            "Bearer sk-abc123"
        );
    }

    #[tokio::test]
    async fn test_client_is_reused_until_options_change() {
        let h = harness(FetchSettings::default(), None).await;

        let a = h.client.client_for(&FetchSettings::default()).await.unwrap();
        let b = h.client.client_for(&FetchSettings::default()).await.unwrap();
        assert_eq!(a.options(), b.options());

        let proxied = FetchSettings::default().proxy("http://127.0.0.1:3128");
        let c = h.client.client_for(&proxied).await.unwrap();
        assert_eq!(c.options().proxy.as_deref(), Some("http://127.0.0.1:3128"));
    }
}
