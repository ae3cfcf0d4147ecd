//! HTTP client with tracing, timeout, and proxy support.

use std::time::Duration;

use reqwest::{header::HeaderMap, Client, Proxy, Response};
use tracing::{debug, instrument};

use crate::error::HttpError;

/// User agent string for packy-usage.
const USER_AGENT: &str = concat!("packy-usage/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HTTP Options
// ============================================================================

/// Options a client is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Proxy every request is routed through.
    pub proxy: Option<String>,
}

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with request tracing.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    options: HttpOptions,
}

impl HttpClient {
    /// Builds a client.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidProxy`] if the proxy URL is rejected and
    /// [`HttpError::Build`] if the TLS backend cannot be initialized.
    pub fn new(options: HttpOptions) -> Result<Self, HttpError> {
        let mut builder = Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT);

        if let Some(url) = &options.proxy {
            let proxy = Proxy::all(url.as_str()).map_err(|source| HttpError::InvalidProxy {
                url: url.clone(),
                source,
            })?;
            builder = builder.proxy(proxy);
            debug!(proxy = %url, "Routing requests through proxy");
        }

        let inner = builder.build().map_err(HttpError::Build)?;
        Ok(Self { inner, options })
    }

    /// Options this client was built with.
    pub fn options(&self) -> &HttpOptions {
        &self.options
    }

    /// Performs a GET request with custom headers.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<Response, reqwest::Error> {
        debug!("GET request");

        let response = self.inner.get(url).headers(headers).send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn options(proxy: Option<&str>) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(10),
            proxy: proxy.map(str::to_string),
        }
    }

    #[test]
    fn test_build_without_proxy() {
        let client = HttpClient::new(options(None)).unwrap();
        assert_eq!(client.options().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_build_with_proxy() {
        let client = HttpClient::new(options(Some("http://127.0.0.1:8080"))).unwrap();
        assert_eq!(
            client.options().proxy.as_deref(),
            Some("http://127.0.0.1:8080")
        );
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let err = HttpClient::new(options(Some("http://[invalid"))).unwrap_err();
        assert!(matches!(err, HttpError::InvalidProxy { .. }));
    }
}
