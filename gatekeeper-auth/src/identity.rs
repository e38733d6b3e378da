//! Identities extracted from certificates.

use subtle::ConstantTimeEq;

/// Identity carried by a certificate, in the form of its subject
/// distinguished name (e.g. `CN=node-a, O=Example`).
///
/// The value is opaque: the engine only ever compares two identities.
///
/// # Security
///
/// Comparisons use constant-time equality. Hash is derived anyway since the
/// hash value is not secret; only equality needs timing protection.
#[derive(Clone, Eq, Hash)]
#[allow(clippy::derived_hash_with_manual_eq)]
pub struct TrustedIdentity(String);

impl TrustedIdentity {
    /// Wrap a distinguished name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The distinguished name as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for TrustedIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::fmt::Display for TrustedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for TrustedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TrustedIdentity({})", self.0)
    }
}
