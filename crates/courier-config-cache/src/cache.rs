//! Advisory TTL cache for configuration documents.
//!
//! A value `V` saved under key `K` occupies two slots: `K` holds `V` and
//! `K_timestamp` holds the save time in epoch milliseconds. Reads are fresh
//! while `now - timestamp < ttl`. Stale entries are left in place until the
//! next save overwrites them.
//!
//! The cache never fails its caller: a storage error reads as a miss and a
//! failed save is dropped.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use courier_common_core::Timestamp;
use courier_common_log::spans::cache_span;

use crate::storage::{FileStorage, InMemoryStorage, StorageBackend};

/// Default time-to-live: five minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Suffix of the slot holding a key's save time.
pub const TIMESTAMP_SUFFIX: &str = "_timestamp";

/// Environment variable selecting a file-backed singleton.
pub const CACHE_PATH_ENV: &str = "COURIER_CACHE_PATH";

static INSTANCE: OnceLock<ConfigurationCache> = OnceLock::new();

#[cfg(test)]
static CONSTRUCTIONS: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

/// Name of the timestamp slot for `key`.
pub fn timestamp_key(key: &str) -> String {
    format!("{key}{TIMESTAMP_SUFFIX}")
}

/// TTL-bounded configuration cache.
///
/// Clones share the same backend.
#[derive(Clone)]
pub struct ConfigurationCache {
    storage: Arc<dyn StorageBackend>,
    ttl: Duration,
}

impl std::fmt::Debug for ConfigurationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ConfigurationCache {
    /// The process-wide cache, built on first use.
    ///
    /// Concurrent first calls construct it once and all observe the same
    /// instance. It lives until the process exits.
    pub fn instance() -> &'static ConfigurationCache {
        INSTANCE.get_or_init(|| {
            #[cfg(test)]
            CONSTRUCTIONS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            ConfigurationCache::new(default_storage())
        })
    }

    /// Cache over `storage` with the default TTL.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self::with_ttl(storage, DEFAULT_TTL)
    }

    /// Cache over `storage` with a custom TTL.
    pub fn with_ttl(storage: Arc<dyn StorageBackend>, ttl: Duration) -> Self {
        Self { storage, ttl }
    }

    /// A cache over the same storage with a different TTL.
    pub fn sharing_storage(&self, ttl: Duration) -> Self {
        Self::with_ttl(Arc::clone(&self.storage), ttl)
    }

    /// Time-to-live of an entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key` as of now.
    pub fn get_configuration(&self, key: &str) -> Option<String> {
        self.get_configuration_at(key, Timestamp::now().as_millis())
    }

    /// Fresh value for `key` as of `now_millis`.
    pub fn get_configuration_at(&self, key: &str, now_millis: i64) -> Option<String> {
        let _span = cache_span("get", key).entered();

        let (value, saved_at) = match self.storage.read_string_and_i64(key, &timestamp_key(key)) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!(error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        let Some(saved_at) = saved_at else {
            tracing::trace!("cache miss");
            return None;
        };

        let age = now_millis.saturating_sub(saved_at);
        if age < self.ttl_millis() {
            tracing::trace!(age_ms = age, "cache hit");
            value
        } else {
            tracing::trace!(age_ms = age, "cache entry expired");
            None
        }
    }

    /// Save `value` under `key`, stamped now.
    pub fn save_configuration(&self, key: &str, value: &str) {
        self.save_configuration_at(key, value, Timestamp::now().as_millis());
    }

    /// Save `value` under `key`, stamped `now_millis`.
    pub fn save_configuration_at(&self, key: &str, value: &str, now_millis: i64) {
        let _span = cache_span("save", key).entered();

        if let Err(e) = self
            .storage
            .write_string_and_i64(key, value, &timestamp_key(key), now_millis)
        {
            tracing::debug!(error = %e, "cache save failed, dropping");
        }
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

fn default_storage() -> Arc<dyn StorageBackend> {
    match std::env::var_os(CACHE_PATH_ENV) {
        Some(path) if !path.is_empty() => {
            tracing::debug!(path = ?path, "using file-backed configuration cache");
            Arc::new(FileStorage::new(path))
        }
        _ => Arc::new(InMemoryStorage::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use proptest::prelude::*;
    use std::sync::atomic::Ordering;
    use std::sync::Barrier;
    use std::thread;

    const KEY: &str = "config";
    const SAVED_AT: i64 = 1_700_000_000_000;

    fn cache() -> ConfigurationCache {
        ConfigurationCache::new(Arc::new(InMemoryStorage::new()))
    }

    struct FailingStorage;

    impl StorageBackend for FailingStorage {
        fn contains_key(&self, _key: &str) -> Result<bool, StorageError> {
            Err(StorageError::Poisoned)
        }

        fn read_string_and_i64(
            &self,
            _string_key: &str,
            _i64_key: &str,
        ) -> Result<(Option<String>, Option<i64>), StorageError> {
            Err(StorageError::Poisoned)
        }

        fn write_string_and_i64(
            &self,
            _string_key: &str,
            _string_value: &str,
            _i64_key: &str,
            _i64_value: i64,
        ) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    #[test]
    fn test_timestamp_key() {
        assert_eq!(timestamp_key("abc"), "abc_timestamp");
    }

    #[test]
    fn test_default_ttl_is_five_minutes() {
        assert_eq!(cache().ttl(), Duration::from_millis(300_000));
    }

    #[test]
    fn test_hit_just_inside_ttl() {
        let cache = cache();
        cache.save_configuration_at(KEY, "value", SAVED_AT);
        assert_eq!(
            cache.get_configuration_at(KEY, SAVED_AT + 299_000).as_deref(),
            Some("value")
        );
    }

    #[test]
    fn test_miss_just_past_ttl() {
        let cache = cache();
        cache.save_configuration_at(KEY, "value", SAVED_AT);
        assert_eq!(cache.get_configuration_at(KEY, SAVED_AT + 301_000), None);
    }

    #[test]
    fn test_miss_exactly_at_ttl() {
        let cache = cache();
        cache.save_configuration_at(KEY, "value", SAVED_AT);
        assert_eq!(cache.get_configuration_at(KEY, SAVED_AT + 300_000), None);
    }

    #[test]
    fn test_missing_timestamp_is_a_miss() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .write_string_and_i64(KEY, "value", "unrelated", 0)
            .unwrap();
        let cache = ConfigurationCache::new(storage);
        assert_eq!(cache.get_configuration_at(KEY, 0), None);
    }

    #[test]
    fn test_save_writes_both_slots() {
        let storage = Arc::new(InMemoryStorage::new());
        let cache = ConfigurationCache::new(storage.clone());
        cache.save_configuration_at(KEY, "value", SAVED_AT);

        assert_eq!(
            storage.read_string_and_i64(KEY, "config_timestamp").unwrap(),
            (Some("value".to_string()), Some(SAVED_AT))
        );
    }

    #[test]
    fn test_stale_entry_is_kept_until_overwritten() {
        let storage = Arc::new(InMemoryStorage::new());
        let cache = ConfigurationCache::new(storage.clone());
        cache.save_configuration_at(KEY, "old", SAVED_AT);

        assert_eq!(cache.get_configuration_at(KEY, SAVED_AT + 600_000), None);
        assert!(storage.contains_key(KEY).unwrap());

        cache.save_configuration_at(KEY, "new", SAVED_AT + 600_000);
        assert_eq!(
            cache.get_configuration_at(KEY, SAVED_AT + 600_001).as_deref(),
            Some("new")
        );
    }

    #[test]
    fn test_custom_ttl() {
        let cache = ConfigurationCache::with_ttl(
            Arc::new(InMemoryStorage::new()),
            Duration::from_secs(1),
        );
        cache.save_configuration_at(KEY, "value", SAVED_AT);
        assert!(cache.get_configuration_at(KEY, SAVED_AT + 999).is_some());
        assert!(cache.get_configuration_at(KEY, SAVED_AT + 1_000).is_none());
    }

    #[test]
    fn test_failing_storage_reads_as_miss_and_save_is_noop() {
        let cache = ConfigurationCache::new(Arc::new(FailingStorage));
        cache.save_configuration_at(KEY, "value", SAVED_AT);
        assert_eq!(cache.get_configuration_at(KEY, SAVED_AT), None);
    }

    #[test]
    fn test_now_based_roundtrip() {
        let cache = cache();
        cache.save_configuration(KEY, "value");
        assert_eq!(cache.get_configuration(KEY).as_deref(), Some("value"));
    }

    #[test]
    fn test_instance_is_built_once_under_concurrent_access() {
        const THREADS: usize = 8;
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    ConfigurationCache::instance() as *const ConfigurationCache as usize
                })
            })
            .collect();

        let addresses: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(CONSTRUCTIONS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_storage() {
        let cache = cache();
        let clone = cache.clone();
        clone.save_configuration_at(KEY, "value", SAVED_AT);
        assert!(cache.get_configuration_at(KEY, SAVED_AT).is_some());
    }

    #[test]
    fn test_sharing_storage_applies_its_own_ttl() {
        let cache = cache();
        let short = cache.sharing_storage(Duration::from_secs(10));
        cache.save_configuration_at(KEY, "value", SAVED_AT);

        assert!(cache.get_configuration_at(KEY, SAVED_AT + 60_000).is_some());
        assert!(short.get_configuration_at(KEY, SAVED_AT + 60_000).is_none());
        assert!(short.get_configuration_at(KEY, SAVED_AT + 9_999).is_some());
    }

    proptest! {
        #[test]
        fn test_freshness_matches_age(age in 0i64..1_000_000) {
            let cache = cache();
            cache.save_configuration_at(KEY, "value", SAVED_AT);
            let hit = cache.get_configuration_at(KEY, SAVED_AT + age).is_some();
            prop_assert_eq!(hit, age < 300_000);
        }
    }
}
