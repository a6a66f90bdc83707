//! Cache-then-fetch loading of gateway configuration.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use courier_http::{HttpError, Request, ResilientHttpClient, RetryPolicy};

use crate::cache::ConfigurationCache;
use crate::configuration::Configuration;

/// Query parameter naming the configuration schema version requested.
pub const CONFIG_VERSION_PARAM: &str = "configVersion";

/// Schema version requested from the gateway.
pub const CONFIG_VERSION: &str = "3";

/// Result of a configuration load.
pub type ConfigurationResult = Result<Configuration, HttpError>;

/// Receives a loaded configuration.
pub type ConfigurationCallback = Box<dyn FnOnce(ConfigurationResult) + Send + 'static>;

/// Cache key for a configuration fetched from `config_url` with
/// `authorization`.
pub fn cache_key(config_url: &str, authorization: &str) -> String {
    STANDARD.encode(format!("{config_url}{authorization}"))
}

/// Serves configuration from the cache, fetching and caching it on a miss.
#[derive(Clone)]
pub struct ConfigurationLoader {
    http: ResilientHttpClient,
    cache: ConfigurationCache,
}

impl std::fmt::Debug for ConfigurationLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationLoader")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ConfigurationLoader {
    /// Loader backed by the process-wide cache.
    pub fn new(http: ResilientHttpClient) -> Self {
        Self::with_cache(http, ConfigurationCache::instance().clone())
    }

    /// Loader backed by `cache`.
    pub fn with_cache(http: ResilientHttpClient, cache: ConfigurationCache) -> Self {
        Self { http, cache }
    }

    /// The cache consulted before fetching.
    pub fn cache(&self) -> &ConfigurationCache {
        &self.cache
    }

    /// Load the configuration at `config_url`.
    ///
    /// A fresh cached copy is handed to `callback` on the calling thread. On
    /// a miss the document is fetched with up to three attempts, cached, and
    /// delivered on the delivery context.
    pub fn load(&self, config_url: &str, authorization: &str, callback: ConfigurationCallback) {
        let key = cache_key(config_url, authorization);

        if let Some(cached) = self.cache.get_configuration(&key) {
            match Configuration::from_json(cached) {
                Ok(configuration) => {
                    tracing::debug!(url = %config_url, "configuration served from cache");
                    callback(Ok(configuration));
                    return;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "cached configuration unreadable, refetching");
                }
            }
        }

        let request = Request::get(versioned_url(config_url))
            .with_header("authorization", format!("Bearer {authorization}"));
        let cache = self.cache.clone();

        self.http.send_request(
            request,
            RetryPolicy::RETRY_UP_TO_3,
            Some(Box::new(move |outcome| {
                let result = outcome.and_then(|body| {
                    let configuration = Configuration::from_json(body)?;
                    cache.save_configuration(&key, configuration.to_json());
                    Ok(configuration)
                });
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "configuration fetch failed");
                }
                callback(result);
            })),
        );
    }
}

fn versioned_url(config_url: &str) -> String {
    let separator = if config_url.contains('?') { '&' } else { '?' };
    format!("{config_url}{separator}{CONFIG_VERSION_PARAM}={CONFIG_VERSION}")
}
