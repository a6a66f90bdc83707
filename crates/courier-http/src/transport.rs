//! Blocking transport: one HTTP exchange per call.

use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;

use crate::error::TransportError;
use crate::request::Request;

/// Performs one blocking HTTP exchange.
///
/// Implementations never retry; retry is a policy applied by
/// [`ResilientHttpClient`](crate::ResilientHttpClient).
pub trait Transport: Send + Sync {
    /// Send `request` and return the response body of a 2xx reply.
    fn execute(&self, request: &Request) -> Result<String, TransportError>;
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL for requests that carry only a path.
    pub base_url: Option<String>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Maximum idle connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("courier/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 10,
            gzip: true,
        }
    }
}

/// Build a configured blocking HTTP client.
pub fn build_client(config: &HttpConfig) -> Result<Client, TransportError> {
    ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .gzip(config.gzip)
        .build()
        .map_err(TransportError::ClientBuild)
}

/// [`Transport`] backed by `reqwest`'s blocking client.
pub struct ReqwestTransport {
    inner: Client,
    base_url: Option<String>,
}

impl ReqwestTransport {
    /// Create a transport with default config.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(HttpConfig::default())
    }

    /// Create a transport with custom config.
    pub fn with_config(config: HttpConfig) -> Result<Self, TransportError> {
        let inner = build_client(&config)?;
        Ok(Self {
            inner,
            base_url: config.base_url,
        })
    }

    /// Get the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    fn resolve(&self, request: &Request) -> Result<String, TransportError> {
        if request.is_absolute() {
            return Ok(request.url().to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!("{}{}", base.trim_end_matches('/'), request.url())),
            None => Err(TransportError::InvalidRequest(format!(
                "relative URL '{}' with no base URL configured",
                request.url()
            ))),
        }
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &Request) -> Result<String, TransportError> {
        let url = self.resolve(request)?;
        tracing::debug!(method = %request.method(), url = %url, "sending request");

        let mut builder = self
            .inner
            .request(request.method().into(), &url)
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.to_string());
        }

        let response = builder.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text()?;
        tracing::debug!(status = status.as_u16(), url = %url, "response received");

        check_status(status, &headers, body)
    }
}

/// Map a response status to the body or a [`TransportError`].
pub fn check_status(
    status: StatusCode,
    headers: &HeaderMap,
    body: String,
) -> Result<String, TransportError> {
    if status.is_success() {
        return Ok(body);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        return Err(TransportError::RateLimited { retry_after });
    }

    if status.is_server_error() {
        Err(TransportError::ServerError {
            status: status.as_u16(),
            body,
        })
    } else {
        Err(TransportError::ClientError {
            status: status.as_u16(),
            body,
        })
    }
}
