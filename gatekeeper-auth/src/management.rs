//! Adapter for management connectors.
//!
//! Management connectors hand over a loosely typed credential tuple and
//! expect either a session or a security error; they have no notion of
//! access levels below "denied".

use std::sync::Arc;

use crate::access::AccessLevel;
use crate::engine::AccessDecisionEngine;

/// Login refused by the management adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SecurityDenied {
    message: String,
}

impl SecurityDenied {
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A successful management login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementSession {
    pub user: String,
    pub access: AccessLevel,
}

/// Authenticates management connector logins through the engine.
#[derive(Debug, Clone)]
pub struct ManagementAuthenticator {
    engine: Arc<AccessDecisionEngine>,
    realm: Option<String>,
}

impl ManagementAuthenticator {
    /// Adapter using the engine's admin realm.
    #[must_use]
    pub fn new(engine: Arc<AccessDecisionEngine>) -> Self {
        Self {
            engine,
            realm: None,
        }
    }

    /// Use `realm` for connector logins instead of the admin realm.
    #[must_use]
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        let realm = realm.into();
        self.realm = (!realm.is_empty()).then_some(realm);
        self
    }

    /// Realm that connector logins are checked against.
    #[must_use]
    pub fn realm(&self) -> &str {
        self.realm
            .as_deref()
            .unwrap_or_else(|| self.engine.admin_realm_name())
    }

    /// Authenticate a `[user]`, `[user, secret]` or `[user, secret, host]`
    /// credential tuple.
    ///
    /// Missing elements are empty; elements past the third are ignored.
    ///
    /// # Errors
    ///
    /// Returns `SecurityDenied` if the engine grants no access or could not
    /// reach a decision.
    pub fn authenticate(&self, credentials: &[&str]) -> Result<ManagementSession, SecurityDenied> {
        let user = credentials.first().copied().unwrap_or_default();
        let secret = credentials.get(1).copied().unwrap_or_default();
        let host = credentials.get(2).copied().filter(|h| !h.is_empty());

        let access = match self
            .engine
            .evaluate_admin_access(user, secret, self.realm(), host)
        {
            Ok(access) => access,
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "Management login could not be evaluated");
                AccessLevel::None
            }
        };

        if !access.is_granted() {
            return Err(SecurityDenied {
                message: self.engine.messages().access_denied(user),
            });
        }

        tracing::debug!(user = %user, access = %access, "Management login accepted");
        Ok(ManagementSession {
            user: user.to_string(),
            access,
        })
    }
}
