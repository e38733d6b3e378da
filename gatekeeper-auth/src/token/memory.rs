//! In-memory one-time token store.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::TokenStore;

/// Every slot of a [`MemoryTokenStore`] holds an unexpired token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("token store full ({outstanding} unexpired tokens)")]
pub struct TokenStoreFull {
    pub outstanding: usize,
}

/// Token store with TTL and bounded capacity.
///
/// # Security Properties
///
/// - Each issued token is accepted at most once, across all threads
/// - Tokens expire after the TTL even if never used
/// - Only SHA-256 hashes of tokens are held in memory
/// - Memory-bounded via max_entries limit; a full store refuses to issue
///   rather than dropping a token someone holds
///
/// # Usage
///
/// ```
/// use gatekeeper_auth::token::{MemoryTokenStore, TokenStore};
/// use std::time::Duration;
///
/// let store = MemoryTokenStore::new(Duration::from_secs(60), 1000);
/// let token = store.issue().unwrap();
/// assert!(store.consume(&token));
/// assert!(!store.consume(&token));
/// ```
pub struct MemoryTokenStore {
    /// Map of token hash -> expiry
    tokens: DashMap<[u8; 32], Instant>,
    ttl: Duration,
    max_entries: usize,
    /// Counter for periodic cleanup (avoids cleanup on every issue)
    issue_counter: AtomicU64,
}

impl MemoryTokenStore {
    /// Create a store whose tokens live for `ttl`.
    ///
    /// # Recommended Values
    ///
    /// - `ttl`: a few seconds to a minute; tokens stand in for an interactive
    ///   login of a single automated command
    /// - `max_entries`: 10,000
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            tokens: DashMap::with_capacity(max_entries.min(1024)),
            ttl,
            max_entries: max_entries.max(1),
            issue_counter: AtomicU64::new(0),
        }
    }

    /// Issue a fresh token (32 random bytes, URL-safe base64).
    ///
    /// Outstanding tokens are never evicted to make room. When every slot
    /// holds an unexpired token the store refuses to issue.
    ///
    /// # Errors
    ///
    /// Returns [`TokenStoreFull`] if `max_entries` unexpired tokens are
    /// outstanding.
    pub fn issue(&self) -> Result<String, TokenStoreFull> {
        let count = self.issue_counter.fetch_add(1, Ordering::Relaxed);
        if count % 1000 == 0 {
            self.cleanup_expired();
        }

        if self.tokens.len() >= self.max_entries {
            self.cleanup_expired();
            let outstanding = self.tokens.len();
            if outstanding >= self.max_entries {
                tracing::warn!(outstanding, "Token store full, refusing to issue");
                return Err(TokenStoreFull { outstanding });
            }
        }

        let mut random = [0u8; 32];
        OsRng.fill_bytes(&mut random);
        let token = URL_SAFE_NO_PAD.encode(random);

        self.tokens
            .insert(Self::hash_token(&token), Instant::now() + self.ttl);
        Ok(token)
    }

    /// Remove expired tokens.
    ///
    /// Not required for correctness - expired tokens are rejected on consume.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.tokens.retain(|_, expires| *expires > now);
    }

    /// Number of outstanding (possibly expired) tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn hash_token(token: &str) -> [u8; 32] {
        Sha256::digest(token.as_bytes()).into()
    }
}

impl TokenStore for MemoryTokenStore {
    fn consume(&self, token: &str) -> bool {
        // Removal is the atomic step: only one caller gets the entry back.
        match self.tokens.remove(&Self::hash_token(token)) {
            Some((_, expires)) => Instant::now() < expires,
            None => false,
        }
    }
}

impl std::fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTokenStore")
            .field("outstanding", &self.tokens.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_issued_token_consumed_once() {
        let store = MemoryTokenStore::new(Duration::from_secs(60), 1000);
        let token = store.issue().unwrap();

        assert!(store.consume(&token));
        assert!(!store.consume(&token));
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_token_rejected() {
        let store = MemoryTokenStore::new(Duration::from_secs(60), 1000);
        let _ = store.issue().unwrap();

        assert!(!store.consume("not-a-token"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_tokens_are_distinct() {
        let store = MemoryTokenStore::new(Duration::from_secs(60), 1000);
        let first = store.issue().unwrap();
        let second = store.issue().unwrap();

        assert_ne!(first, second);
        assert!(store.consume(&second));
        assert!(store.consume(&first));
    }

    #[test]
    fn test_expired_token_rejected() {
        let store = MemoryTokenStore::new(Duration::from_millis(10), 1000);
        let token = store.issue().unwrap();

        thread::sleep(Duration::from_millis(20));

        assert!(!store.consume(&token));
        assert!(store.is_empty());
    }

    #[test]
    fn test_cleanup_removes_expired() {
        let store = MemoryTokenStore::new(Duration::from_millis(10), 1000);
        let _ = store.issue().unwrap();
        assert_eq!(store.len(), 1);

        thread::sleep(Duration::from_millis(20));

        store.cleanup_expired();
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_full_store_refuses_instead_of_evicting() {
        let max_entries = 10;
        let store = MemoryTokenStore::new(Duration::from_secs(60), max_entries);

        let held: Vec<String> = (0..max_entries).map(|_| store.issue().unwrap()).collect();
        assert_eq!(
            store.issue(),
            Err(TokenStoreFull {
                outstanding: max_entries
            })
        );
        assert_eq!(store.len(), max_entries);

        // Every token handed out before the refusal is still honoured.
        for token in &held[1..] {
            assert!(store.consume(token));
        }

        // Consuming frees a slot.
        assert!(store.issue().is_ok());
        assert!(store.consume(&held[0]));
    }

    #[test]
    fn test_full_store_reclaims_expired_slots() {
        let store = MemoryTokenStore::new(Duration::from_millis(10), 2);
        let _ = store.issue().unwrap();
        let _ = store.issue().unwrap();

        thread::sleep(Duration::from_millis(20));

        let token = store.issue().unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.consume(&token));
    }

    #[test]
    fn test_concurrent_consume() {
        let store = Arc::new(MemoryTokenStore::new(Duration::from_secs(60), 1000));
        let token = store.issue().unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = Arc::clone(&store);
                let token = token.clone();
                thread::spawn(move || store.consume(&token))
            })
            .collect();

        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let success_count = results.iter().filter(|&&r| r).count();
        assert_eq!(success_count, 1, "Exactly one concurrent consume should succeed");
    }
}
