//! Alias to expected-identity cache over a lazily loaded trust store.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

use crate::cert::identity_from_der;
use crate::identity::TrustedIdentity;

use super::store::{TrustStoreEntry, TrustStoreError, TrustStoreLoader, TrustStoreProvider};

/// Memoizes alias → identity resolutions.
///
/// # Caching
///
/// - Append-only: an entry, once written, is never replaced or evicted
/// - Only successful resolutions are cached; a missing alias or a non-certificate
///   entry is looked up again on the next call
/// - Concurrent first use may resolve the same alias twice, but the first
///   write wins and every caller sees that value afterwards
///
/// # Lazy loading
///
/// The trust store handle is loaded on first use under a mutex, so concurrent
/// first accesses load it once. A failed load leaves the slot empty and the
/// next call retries. The mutex is not held during alias lookups.
pub struct PrincipalCache {
    loader: Arc<dyn TrustStoreLoader>,
    store: Mutex<Option<Arc<dyn TrustStoreProvider>>>,
    principals: DashMap<String, TrustedIdentity>,
}

impl PrincipalCache {
    #[must_use]
    pub fn new(loader: Arc<dyn TrustStoreLoader>) -> Self {
        Self {
            loader,
            store: Mutex::new(None),
            principals: DashMap::new(),
        }
    }

    /// Resolve the identity expected for `alias`.
    ///
    /// Returns `Ok(None)` when the alias is absent or does not hold a
    /// certificate.
    ///
    /// # Errors
    ///
    /// Returns a `TrustStoreError` if the store cannot be loaded or read, or if
    /// the stored certificate is malformed.
    pub fn resolve(&self, alias: &str) -> Result<Option<TrustedIdentity>, TrustStoreError> {
        if let Some(cached) = self.principals.get(alias) {
            return Ok(Some(cached.value().clone()));
        }

        let store = self.trust_store()?;
        let identity = match store.certificate_for(alias)? {
            Some(TrustStoreEntry::Certificate(der)) => {
                identity_from_der(&der).map_err(|e| TrustStoreError::MalformedCertificate {
                    alias: alias.to_string(),
                    reason: e.to_string(),
                })?
            }
            Some(TrustStoreEntry::Other { kind }) => {
                tracing::debug!(alias = %alias, kind = %kind, "Trust store entry is not a certificate");
                return Ok(None);
            }
            None => {
                tracing::debug!(alias = %alias, "No trust store entry for alias");
                return Ok(None);
            }
        };

        let cached = self
            .principals
            .entry(alias.to_string())
            .or_insert(identity)
            .value()
            .clone();
        tracing::debug!(alias = %alias, identity = %cached, "Cached expected principal");
        Ok(Some(cached))
    }

    /// Number of cached aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.principals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    fn trust_store(&self) -> Result<Arc<dyn TrustStoreProvider>, TrustStoreError> {
        let mut slot = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = slot.as_ref() {
            return Ok(Arc::clone(store));
        }

        let store = self.loader.load().map_err(|e| {
            tracing::warn!(error = %e, "Failed to load trust store");
            e
        })?;
        *slot = Some(Arc::clone(&store));
        Ok(store)
    }
}

impl std::fmt::Debug for PrincipalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalCache")
            .field("cached", &self.principals.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingLoader, MapTrustStore, self_signed_der};
    use std::thread;

    #[test]
    fn test_resolves_certificate_subject() {
        let store = MapTrustStore::new().with_certificate("coordinator", self_signed_der("coordinator"));
        let cache = PrincipalCache::new(Arc::new(CountingLoader::new(store)));

        let identity = cache.resolve("coordinator").unwrap();
        assert_eq!(identity, Some(TrustedIdentity::new("CN=coordinator")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cached_alias_is_not_requeried() {
        let store = MapTrustStore::new().with_certificate("instance", self_signed_der("instance"));
        let lookups = store.lookup_counter();
        let cache = PrincipalCache::new(Arc::new(CountingLoader::new(store)));

        for _ in 0..5 {
            assert!(cache.resolve("instance").unwrap().is_some());
        }
        assert_eq!(lookups.get(), 1);
    }

    #[test]
    fn test_missing_alias_not_cached() {
        let store = MapTrustStore::new();
        let lookups = store.lookup_counter();
        let cache = PrincipalCache::new(Arc::new(CountingLoader::new(store)));

        assert_eq!(cache.resolve("coordinator").unwrap(), None);
        assert_eq!(cache.resolve("coordinator").unwrap(), None);
        assert!(cache.is_empty());
        assert_eq!(lookups.get(), 2);
    }

    #[test]
    fn test_wrong_type_entry_not_cached() {
        let store = MapTrustStore::new().with_other("coordinator", "secret key");
        let lookups = store.lookup_counter();
        let cache = PrincipalCache::new(Arc::new(CountingLoader::new(store)));

        assert_eq!(cache.resolve("coordinator").unwrap(), None);
        assert_eq!(cache.resolve("coordinator").unwrap(), None);
        assert!(cache.is_empty());
        assert_eq!(lookups.get(), 2);
    }

    #[test]
    fn test_malformed_certificate_is_an_error() {
        let store = MapTrustStore::new().with_certificate("coordinator", b"garbage".to_vec());
        let cache = PrincipalCache::new(Arc::new(CountingLoader::new(store)));

        let result = cache.resolve("coordinator");
        assert!(matches!(
            result,
            Err(TrustStoreError::MalformedCertificate { .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_loaded_once() {
        let store = MapTrustStore::new()
            .with_certificate("a", self_signed_der("a"))
            .with_certificate("b", self_signed_der("b"));
        let loader = Arc::new(CountingLoader::new(store));
        let cache = PrincipalCache::new(loader.clone());

        cache.resolve("a").unwrap();
        cache.resolve("b").unwrap();
        cache.resolve("missing").unwrap();
        assert_eq!(loader.loads(), 1);
    }

    #[test]
    fn test_failed_load_is_retried() {
        let store = MapTrustStore::new().with_certificate("coordinator", self_signed_der("coordinator"));
        let loader = Arc::new(CountingLoader::new(store).failing_first(2));
        let cache = PrincipalCache::new(loader.clone());

        assert!(matches!(
            cache.resolve("coordinator"),
            Err(TrustStoreError::Unavailable(_))
        ));
        assert!(matches!(
            cache.resolve("coordinator"),
            Err(TrustStoreError::Unavailable(_))
        ));
        assert_eq!(
            cache.resolve("coordinator").unwrap(),
            Some(TrustedIdentity::new("CN=coordinator"))
        );
        assert_eq!(loader.loads(), 3);
    }

    #[test]
    fn test_concurrent_first_use() {
        let store = MapTrustStore::new().with_certificate("coordinator", self_signed_der("coordinator"));
        let loader = Arc::new(CountingLoader::new(store));
        let cache = Arc::new(PrincipalCache::new(loader.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.resolve("coordinator").unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(
                handle.join().unwrap(),
                Some(TrustedIdentity::new("CN=coordinator"))
            );
        }
        assert_eq!(loader.loads(), 1);
        assert_eq!(cache.len(), 1);
    }
}
