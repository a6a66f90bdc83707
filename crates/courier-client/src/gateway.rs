//! Gateway facade: one configured entry point for every call.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use courier_common_config::CourierConfig;
use courier_common_core::SessionId;
use courier_common_thread::ThreadScheduler;
use courier_config_cache::{
    ConfigurationCache, ConfigurationCallback, ConfigurationLoader, FileStorage,
};
use courier_http::{
    HttpConfig, HttpError, HttpResponseCallback, Method, ReqwestTransport, RequestBuilder,
    ResilientHttpClient, RetryPolicy, TransportError,
};

use crate::api::ApiClient;

/// Errors building a [`Gateway`] from configuration.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("failed to build HTTP transport: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to start scheduler threads: {0}")]
    Scheduler(#[from] std::io::Error),
}

/// Owns the HTTP client and session state shared by every API call.
pub struct Gateway {
    http: ResilientHttpClient,
    requests: RequestBuilder,
    session_id: SessionId,
    loader: ConfigurationLoader,
    config_url: Option<String>,
    authorization: String,
}

impl Gateway {
    /// Gateway for `base_url`, authorizing with `authorization`.
    ///
    /// Configuration loads go through the process-wide cache.
    pub fn new(
        http: ResilientHttpClient,
        base_url: impl Into<String>,
        authorization: impl Into<String>,
    ) -> Self {
        Self::assemble(http, Some(base_url.into()), authorization.into())
    }

    fn assemble(http: ResilientHttpClient, base_url: Option<String>, authorization: String) -> Self {
        let mut requests = RequestBuilder::new();
        if let Some(base_url) = base_url {
            requests = requests.base_url(base_url);
        }
        if !authorization.is_empty() {
            requests = requests.bearer_auth(&authorization);
        }

        Self {
            loader: ConfigurationLoader::new(http.clone()),
            http,
            requests,
            session_id: SessionId::new(),
            config_url: None,
            authorization,
        }
    }

    /// Set the URL configuration is fetched from.
    pub fn with_config_url(mut self, config_url: impl Into<String>) -> Self {
        self.config_url = Some(config_url.into());
        self
    }

    /// Replace the configuration loader.
    pub fn with_loader(mut self, loader: ConfigurationLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Build a gateway over real threads and a `reqwest` transport.
    ///
    /// Either `http.base_url` or `gateway.config_url` must be set. Without a
    /// base URL only absolute targets and configuration loads can be reached.
    pub fn from_config(config: &CourierConfig) -> Result<Arc<Self>, GatewayError> {
        if config.http.base_url.is_none() && config.gateway.config_url.is_none() {
            return Err(GatewayError::MissingSetting("http.base_url"));
        }

        let http = build_http_client(config)?;

        let cache = configuration_cache(
            config.cache.path.as_deref(),
            Duration::from_secs(config.cache.ttl_secs),
        );
        let loader = ConfigurationLoader::with_cache(http.clone(), cache);

        let mut gateway = Self::assemble(
            http,
            config.http.base_url.clone(),
            config.gateway.authorization.clone().unwrap_or_default(),
        )
        .with_loader(loader);
        gateway.config_url = config.gateway.config_url.clone();

        tracing::info!(
            session = %gateway.session_id,
            workers = config.scheduler.worker_threads,
            "gateway ready"
        );
        Ok(Arc::new(gateway))
    }

    /// Session identifier sent with tokenization payloads.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &ResilientHttpClient {
        &self.http
    }

    /// The request builder stamping base URL and authorization.
    pub fn requests(&self) -> &RequestBuilder {
        &self.requests
    }

    /// Client for versioned API resources, holding a weak reference back to
    /// this gateway.
    pub fn api_client(self: &Arc<Self>) -> ApiClient {
        ApiClient::new(self)
    }

    /// `GET path`, retried up to three times.
    pub fn send_get(&self, path: &str, callback: Option<HttpResponseCallback>) {
        self.http
            .send_request(self.requests.get(path), RetryPolicy::RETRY_UP_TO_3, callback);
    }

    /// `POST path` with a JSON `body`. Never retried.
    pub fn send_post(
        &self,
        path: &str,
        body: impl Into<String>,
        callback: Option<HttpResponseCallback>,
    ) {
        let request = self
            .requests
            .clone()
            .json_content()
            .build(Method::Post, path)
            .with_body(body);
        self.http.send_request(request, RetryPolicy::NoRetry, callback);
    }

    /// `POST` a JSON `body` to the GraphQL endpoint named by the gateway
    /// configuration.
    pub fn send_graphql_post(&self, body: impl Into<String>, callback: HttpResponseCallback) {
        let body = body.into();
        let http = self.http.clone();
        let requests = self.requests.clone().json_content();

        self.get_configuration(Box::new(move |result| {
            let configuration = match result {
                Ok(configuration) => configuration,
                Err(e) => return callback(Err(e)),
            };
            let Some(url) = configuration.graphql_url() else {
                return callback(Err(HttpError::Transport(TransportError::InvalidRequest(
                    "configuration has no GraphQL endpoint".to_string(),
                ))));
            };

            let request = requests.build(Method::Post, url).with_body(body);
            http.send_request(request, RetryPolicy::NoRetry, Some(callback));
        }));
    }

    /// Load the gateway configuration, from cache when fresh.
    pub fn get_configuration(&self, callback: ConfigurationCallback) {
        match &self.config_url {
            Some(config_url) => self.loader.load(config_url, &self.authorization, callback),
            None => callback(Err(HttpError::Transport(TransportError::InvalidRequest(
                "no configuration URL configured".to_string(),
            )))),
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("session_id", &self.session_id)
            .field("config_url", &self.config_url)
            .finish_non_exhaustive()
    }
}

/// Resilient client over a `reqwest` transport and a thread scheduler sized
/// from `config`.
pub fn build_http_client(config: &CourierConfig) -> Result<ResilientHttpClient, GatewayError> {
    let transport = ReqwestTransport::with_config(http_config(config))?;
    let scheduler = ThreadScheduler::new(config.scheduler.worker_threads)?;
    Ok(ResilientHttpClient::new(Arc::new(transport), Arc::new(scheduler)))
}

/// Transport settings from `config`.
pub fn http_config(config: &CourierConfig) -> HttpConfig {
    let defaults = HttpConfig::default();
    HttpConfig {
        base_url: config.http.base_url.clone(),
        connect_timeout: Duration::from_secs(config.http.connect_timeout_secs),
        request_timeout: Duration::from_secs(config.http.request_timeout_secs),
        user_agent: config.http.user_agent.clone().unwrap_or(defaults.user_agent),
        pool_max_idle_per_host: config.http.pool_max_idle_per_host,
        gzip: config.http.gzip,
    }
}

fn configuration_cache(path: Option<&Path>, ttl: Duration) -> ConfigurationCache {
    match path {
        Some(path) => ConfigurationCache::with_ttl(Arc::new(FileStorage::new(path)), ttl),
        None => ConfigurationCache::instance().sharing_storage(ttl),
    }
}
