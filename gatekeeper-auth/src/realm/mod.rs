//! Identity realms and username/password verification.
//!
//! Two kinds of realm back the administrative login:
//!
//! - the built-in local realm, a file-backed user store read through
//!   [`LocalIdentityStore`]
//! - delegated realms (LDAP and friends) reached through an
//!   [`IdentityRealmProvider`]
//!
//! Both answer with plain booleans. A missing user, a malformed record or a
//! provider failure is a denial, never an error.

mod credential;

use std::collections::BTreeSet;
use std::sync::Arc;

pub use credential::{CredentialError, SSHA256_PREFIX, StoredCredential};

/// Group whose members may administer the domain.
pub const ADMIN_GROUP_NAME: &str = "asadmin";

/// A user record of the local realm.
#[derive(Debug, Clone)]
pub struct RealmUser {
    name: String,
    groups: BTreeSet<String>,
    credential: StoredCredential,
}

impl RealmUser {
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, groups: I, credential: StoredCredential) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            groups: groups.into_iter().map(Into::into).collect(),
            credential,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    #[must_use]
    pub fn credential(&self) -> &StoredCredential {
        &self.credential
    }

    #[must_use]
    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    #[must_use]
    pub fn verify_secret(&self, secret: &str) -> bool {
        self.credential.verify(secret)
    }
}

/// Error reading the local identity store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum IdentityStoreError {
    #[error("identity store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed record for user '{user}': {reason}")]
    MalformedRecord { user: String, reason: String },
}

/// Error from a delegated login.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LoginError {
    #[error("login rejected")]
    Rejected,

    #[error("unknown realm '{0}'")]
    UnknownRealm(String),

    #[error("realm provider failure: {0}")]
    Provider(String),
}

/// The built-in local (file-backed) user store.
pub trait LocalIdentityStore: Send + Sync {
    /// Look up a user. `Ok(None)` if the user does not exist.
    fn user_by_name(&self, name: &str) -> Result<Option<RealmUser>, IdentityStoreError>;

    /// All user names, in store order.
    fn all_usernames(&self) -> Result<Vec<String>, IdentityStoreError>;
}

/// A principal attached to an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionPrincipal {
    User(String),
    Group(String),
}

/// Session returned by a successful delegated login.
pub trait AuthenticatedSession: Send {
    /// Principals of the session, used to confirm group membership.
    fn principals(&self) -> Result<Vec<SessionPrincipal>, LoginError>;
}

/// External login provider for delegated realms.
///
/// Implementations may block on network IO.
pub trait IdentityRealmProvider: Send + Sync {
    fn login(
        &self,
        user: &str,
        secret: &str,
        realm: &str,
    ) -> Result<Box<dyn AuthenticatedSession>, LoginError>;
}

/// How the administrative realm verifies credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealmKind {
    /// Built-in local realm backed by a [`LocalIdentityStore`].
    Local,
    /// Delegated realm backed by an [`IdentityRealmProvider`].
    Delegated {
        /// The realm maps its own groups; membership in the admin group must
        /// be confirmed from the session principals.
        enforces_group_mapping: bool,
    },
}

/// A configured realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRealm {
    pub name: String,
    pub kind: RealmKind,
}

impl AdminRealm {
    #[must_use]
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RealmKind::Local,
        }
    }

    #[must_use]
    pub fn delegated(name: impl Into<String>, enforces_group_mapping: bool) -> Self {
        Self {
            name: name.into(),
            kind: RealmKind::Delegated {
                enforces_group_mapping,
            },
        }
    }
}

/// Verifies username/secret pairs against the local or a delegated realm.
#[derive(Clone, Default)]
pub struct RealmAuthenticator {
    local: Option<Arc<dyn LocalIdentityStore>>,
    delegated: Option<Arc<dyn IdentityRealmProvider>>,
}

impl RealmAuthenticator {
    #[must_use]
    pub fn new(
        local: Option<Arc<dyn LocalIdentityStore>>,
        delegated: Option<Arc<dyn IdentityRealmProvider>>,
    ) -> Self {
        Self { local, delegated }
    }

    pub(crate) fn has_local(&self) -> bool {
        self.local.is_some()
    }

    pub(crate) fn has_delegated(&self) -> bool {
        self.delegated.is_some()
    }

    /// Verify against the local realm.
    ///
    /// An empty `user` is replaced by the default admin user, if there is one.
    /// The user must exist, be a member of [`ADMIN_GROUP_NAME`], and present
    /// the right secret.
    #[must_use]
    pub fn verify_local(&self, user: &str, secret: &str) -> bool {
        let Some(store) = self.local.as_deref() else {
            return false;
        };

        let user = if user.is_empty() {
            match Self::default_admin_user(store) {
                Some(default) => {
                    tracing::debug!(user = %default, "Using default admin user");
                    default
                }
                None => {
                    tracing::debug!("No default admin user");
                    return false;
                }
            }
        } else {
            user.to_string()
        };

        let record = match store.user_by_name(&user) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(user = %user, "No such user in local realm");
                return false;
            }
            Err(e) => {
                tracing::debug!(user = %user, error = %e, "Local realm lookup failed");
                return false;
            }
        };

        if !record.is_member_of(ADMIN_GROUP_NAME) {
            tracing::debug!(user = %user, "User is not a member of the admin group");
            return false;
        }

        let verified = record.verify_secret(secret);
        tracing::debug!(user = %user, verified, "Local realm authentication");
        verified
    }

    /// The single admin-group member of the local realm, if exactly one exists.
    #[must_use]
    pub fn default_admin_user_name(&self) -> Option<String> {
        self.local
            .as_deref()
            .and_then(|store| Self::default_admin_user(store))
    }

    /// Any lookup error means the admin set is unknown, so there is no default.
    fn default_admin_user(store: &dyn LocalIdentityStore) -> Option<String> {
        let names = match store.all_usernames() {
            Ok(names) => names,
            Err(e) => {
                tracing::debug!(error = %e, "Cannot list local realm users");
                return None;
            }
        };

        let mut admin = None;
        for name in names {
            match store.user_by_name(&name) {
                Ok(Some(user)) if user.is_member_of(ADMIN_GROUP_NAME) => {
                    if admin.replace(name).is_some() {
                        return None;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(user = %name, error = %e, "Cannot decide default admin user");
                    return None;
                }
            }
        }
        admin
    }

    /// Verify against a delegated realm.
    ///
    /// When `enforce_group_mapping` is set, the session must also carry the
    /// admin group among its principals.
    #[must_use]
    pub fn verify_delegated(
        &self,
        user: &str,
        secret: &str,
        realm: &str,
        enforce_group_mapping: bool,
    ) -> bool {
        let Some(provider) = self.delegated.as_deref() else {
            return false;
        };

        let session = match provider.login(user, secret, realm) {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!(user = %user, realm = %realm, error = %e, "Delegated login failed");
                return false;
            }
        };

        !enforce_group_mapping || Self::ensure_group_membership(session.as_ref())
    }

    /// Scan the session principals for the admin group.
    ///
    /// A failure while reading the principals counts as "not a member".
    fn ensure_group_membership(session: &dyn AuthenticatedSession) -> bool {
        match session.principals() {
            Ok(principals) => {
                let member = principals
                    .iter()
                    .any(|p| matches!(p, SessionPrincipal::Group(g) if g == ADMIN_GROUP_NAME));
                if !member {
                    tracing::debug!("User is not a member of the admin group");
                }
                member
            }
            Err(e) => {
                tracing::debug!(error = %e, "User is not a member of the admin group");
                false
            }
        }
    }
}

impl std::fmt::Debug for RealmAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmAuthenticator")
            .field("local", &self.local.is_some())
            .field("delegated", &self.delegated.is_some())
            .finish()
    }
}
