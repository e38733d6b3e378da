//! Certificate trust store primitives.
//!
//! The trust store maps aliases (e.g. the coordinator's or the instances'
//! alias) to the certificates peer nodes present on the secure transport.

use std::sync::Arc;

/// An entry held under an alias in the trust store.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrustStoreEntry {
    /// DER-encoded X.509 certificate.
    Certificate(Vec<u8>),
    /// Anything else (key material, unsupported certificate types).
    Other {
        /// Short description of the entry type, for logs.
        kind: String,
    },
}

/// Errors raised while loading or reading the trust store.
///
/// These are infrastructure faults: they deny the current request but are
/// never remembered, so the next request retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TrustStoreError {
    /// The trust store could not be opened.
    #[error("trust store unavailable: {0}")]
    Unavailable(String),

    /// Reading an alias failed.
    #[error("failed to read trust store entry '{alias}': {reason}")]
    Read { alias: String, reason: String },

    /// The certificate stored under an alias could not be parsed.
    #[error("malformed certificate under alias '{alias}': {reason}")]
    MalformedCertificate { alias: String, reason: String },
}

/// Read access to a loaded trust store.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; lookups happen concurrently and
/// may block on IO.
pub trait TrustStoreProvider: Send + Sync {
    /// Look up the entry stored under `alias`.
    ///
    /// Returns `Ok(None)` if the alias is not present.
    fn certificate_for(&self, alias: &str) -> Result<Option<TrustStoreEntry>, TrustStoreError>;
}

/// Lazily acquires the trust store handle.
///
/// Called at most once per successful load; a failed load is retried on the
/// next request.
pub trait TrustStoreLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn TrustStoreProvider>, TrustStoreError>;
}

impl<F> TrustStoreLoader for F
where
    F: Fn() -> Result<Arc<dyn TrustStoreProvider>, TrustStoreError> + Send + Sync,
{
    fn load(&self) -> Result<Arc<dyn TrustStoreProvider>, TrustStoreError> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MapTrustStore;

    #[test]
    fn test_closure_loader() {
        let store: Arc<dyn TrustStoreProvider> =
            Arc::new(MapTrustStore::new().with_other("signing-key", "private key"));
        let loader = move || -> Result<Arc<dyn TrustStoreProvider>, TrustStoreError> {
            Ok(Arc::clone(&store))
        };

        let loaded = TrustStoreLoader::load(&loader).unwrap();
        assert_eq!(
            loaded.certificate_for("signing-key").unwrap(),
            Some(TrustStoreEntry::Other {
                kind: "private key".to_string()
            })
        );
        assert_eq!(loaded.certificate_for("missing").unwrap(), None);
    }

    #[test]
    fn test_error_display() {
        let err = TrustStoreError::Read {
            alias: "coordinator".to_string(),
            reason: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to read trust store entry 'coordinator': permission denied"
        );
    }
}
