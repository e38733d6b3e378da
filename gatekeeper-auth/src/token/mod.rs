//! One-time authentication tokens.

mod memory;

use std::sync::Arc;

pub use memory::{MemoryTokenStore, TokenStoreFull};

/// Store of single-use tokens.
///
/// # Atomicity
///
/// `consume` **MUST be atomic** across all callers in the process: for a
/// given token value at most one call ever returns `true`. Implementations
/// must not split the operation into a separate check and removal, or two
/// concurrent requests presenting the same token could both be accepted.
pub trait TokenStore: Send + Sync {
    /// Consume the token if it is valid.
    ///
    /// Returns `true` if the token was valid and is now retired.
    fn consume(&self, token: &str) -> bool;
}

/// Gate in front of a [`TokenStore`].
///
/// The store's single `consume` call is the sole authority; the gate only
/// rejects absent tokens without touching the store.
#[derive(Clone)]
pub struct TokenGate {
    store: Arc<dyn TokenStore>,
}

impl TokenGate {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Accept (and retire) a presented token.
    #[must_use]
    pub fn accept(&self, token: Option<&str>) -> bool {
        match token {
            Some(token) if !token.is_empty() => self.store.consume(token),
            _ => false,
        }
    }
}

impl std::fmt::Debug for TokenGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGate").finish_non_exhaustive()
    }
}
