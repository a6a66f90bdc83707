//! Advisory configuration cache for Courier.
//!
//! [`ConfigurationCache`] is a process-wide TTL cache over a pluggable
//! [`StorageBackend`]. [`ConfigurationLoader`] consults it before fetching a
//! [`Configuration`] through a [`courier_http::ResilientHttpClient`].

pub mod cache;
pub mod configuration;
pub mod loader;
pub mod storage;

pub use cache::{timestamp_key, ConfigurationCache, CACHE_PATH_ENV, DEFAULT_TTL, TIMESTAMP_SUFFIX};
pub use configuration::Configuration;
pub use loader::{cache_key, ConfigurationCallback, ConfigurationLoader, ConfigurationResult};
pub use storage::{FileStorage, InMemoryStorage, StorageBackend, StorageError, StoredValue};
