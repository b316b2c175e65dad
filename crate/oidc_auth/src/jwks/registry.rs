use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use reqwest::Client;
use tracing::debug;

use super::KeySetCache;
use crate::config::JwksCacheParams;

struct Entry {
    cache: Arc<KeySetCache>,
    last_used: Instant,
}

impl Entry {
    fn is_held(&self) -> bool {
        Arc::strong_count(&self.cache) > 1
    }
}

/// Keeps one `KeySetCache` per JWKS URL across verification calls.
///
/// The handles handed out are reference counted. Once released by the last caller, a cache
/// is forgotten if it never fetched a key set. Otherwise it keeps refreshing in the background
/// until it has been idle for a whole refresh interval, when the next `acquire` sweeps it.
/// Only the registry tears the caches down.
pub struct JwksRegistry {
    params: JwksCacheParams,
    client: Client,
    caches: Mutex<HashMap<String, Entry>>,
}

impl JwksRegistry {
    #[must_use]
    pub fn new(params: JwksCacheParams, client: Client) -> Self {
        Self {
            params,
            client,
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Get a handle on the cache of `jwks_uri`, creating the cache on first use.
    ///
    /// Caches no caller used during the last refresh interval are released first.
    pub fn acquire(&self, jwks_uri: &str) -> Arc<KeySetCache> {
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let idle_timeout = self.params.refresh_interval;
        caches.retain(|uri, entry| {
            let expired = uri != jwks_uri
                && !entry.is_held()
                && now.duration_since(entry.last_used) >= idle_timeout;
            if expired {
                debug!("releasing idle JWKS cache of {uri}");
                entry.cache.teardown();
            }
            !expired
        });

        let entry = caches.entry(jwks_uri.to_owned()).or_insert_with(|| {
            debug!("new JWKS cache for {jwks_uri}");
            Entry {
                cache: KeySetCache::new(jwks_uri, self.params.clone(), self.client.clone()),
                last_used: now,
            }
        });
        entry.last_used = now;
        entry.cache.clone()
    }

    /// Give back a handle obtained from `acquire`.
    ///
    /// The cache is forgotten when this was the last handle and no key set was ever fetched.
    pub fn release(&self, cache: Arc<KeySetCache>) {
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        let jwks_uri = cache.jwks_uri().to_owned();
        let never_fetched = cache.snapshot().is_none();
        drop(cache);

        let Some(entry) = caches.get_mut(&jwks_uri) else {
            return
        };
        entry.last_used = Instant::now();
        if never_fetched && !entry.is_held() {
            if let Some(entry) = caches.remove(&jwks_uri) {
                debug!("forgetting the JWKS cache of {jwks_uri}: no key set was fetched");
                entry.cache.teardown();
            }
        }
    }

    /// Number of handles currently held by callers on the cache of `jwks_uri`
    #[must_use]
    pub fn handles(&self, jwks_uri: &str) -> usize {
        self.caches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(jwks_uri)
            .map_or(0, |entry| Arc::strong_count(&entry.cache) - 1)
    }

    /// The JWKS URLs of the registered caches, sorted
    #[must_use]
    pub fn jwks_uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self
            .caches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        uris.sort();
        uris
    }

    /// Tear down and forget the caches no caller holds a handle on.
    /// Returns the number of released caches.
    pub fn release_idle(&self) -> usize {
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        let before = caches.len();
        caches.retain(|_, entry| {
            let idle = !entry.is_held();
            if idle {
                entry.cache.teardown();
            }
            !idle
        });
        before - caches.len()
    }

    /// Stop every background refresh and forget all the caches.
    ///
    /// Handles still held by callers remain usable, without background refresh.
    pub fn shutdown(&self) {
        let caches: Vec<Arc<KeySetCache>> = self
            .caches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, entry)| entry.cache)
            .collect();
        for cache in caches {
            cache.teardown();
        }
    }
}

impl Drop for JwksRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::JwksRegistry;
    use crate::config::JwksCacheParams;

    const CERTS: &str = "http://localhost:8080/realms/community/protocol/openid-connect/certs";

    #[test]
    fn test_one_cache_per_jwks_uri() {
        let registry = JwksRegistry::new(JwksCacheParams::default(), reqwest::Client::new());
        let first = registry.acquire(CERTS);
        let second = registry.acquire(CERTS);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.handles(CERTS), 2);

        let other = registry.acquire("http://localhost:8080/realms/master/protocol/openid-connect/certs");
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.jwks_uris().len(), 2);
    }

    #[test]
    fn test_release_idle_keeps_held_caches() {
        let registry = JwksRegistry::new(JwksCacheParams::default(), reqwest::Client::new());
        let held = registry.acquire(CERTS);
        drop(registry.acquire("http://localhost:8080/realms/master/protocol/openid-connect/certs"));

        assert_eq!(registry.release_idle(), 1);
        assert_eq!(registry.jwks_uris(), vec![CERTS.to_owned()]);

        drop(held);
        assert_eq!(registry.handles(CERTS), 0);
        assert_eq!(registry.release_idle(), 1);
        assert!(registry.jwks_uris().is_empty());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let registry = JwksRegistry::new(JwksCacheParams::default(), reqwest::Client::new());
        let cache = registry.acquire(CERTS);
        registry.shutdown();
        registry.shutdown();
        assert!(!cache.is_refreshing_in_background());
        assert!(registry.jwks_uris().is_empty());
    }

    #[test]
    fn test_release_forgets_never_fetched_caches() {
        let registry = JwksRegistry::new(JwksCacheParams::default(), reqwest::Client::new());
        let first = registry.acquire(CERTS);
        let second = registry.acquire(CERTS);

        registry.release(first);
        assert_eq!(registry.jwks_uris(), vec![CERTS.to_owned()]);
        registry.release(second);
        assert!(registry.jwks_uris().is_empty());

        // releasing a handle of a forgotten cache is a no-op
        let cache = registry.acquire(CERTS);
        registry.shutdown();
        registry.release(cache);
        assert!(registry.jwks_uris().is_empty());
    }
}
