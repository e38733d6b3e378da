//! Engine error types.
//!
//! Ordinary credential and policy denials are not errors; they resolve to
//! [`AccessLevel::None`](crate::AccessLevel::None). Errors are reserved for
//! deployment defects and infrastructure faults.

use crate::trust::TrustStoreError;

/// Errors raised by the decision engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The engine was wired or configured inconsistently (e.g. the admin realm
    /// does not exist). Raised when the engine is built, never per request.
    #[error("configuration fault: {0}")]
    Configuration(String),

    /// The trust store could not be read. Denies the current request; the
    /// next request retries.
    #[error(transparent)]
    TrustStore(#[from] TrustStoreError),
}

impl AuthError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
