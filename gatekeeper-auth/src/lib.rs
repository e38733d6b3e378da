//! Administrative access decision engine.
//!
//! Given the claimed identity of an administrative request, the engine decides
//! whether to grant no access, monitoring-only access, or full access. The
//! policy is evaluated in a fixed order and stops at the first strategy that
//! accepts:
//!
//! 1. process-local shared secret
//! 2. trusted sender (certificate identity, admin indicator header, one-time token)
//! 3. remote policy gate (no plaintext remote logins while secure admin is off)
//! 4. realm authentication (local keyfile realm or a delegated login provider)
//!
//! The crate does no filesystem or network IO of its own. Collaborators are
//! injected through traits:
//! - [`LocalSecretProvider`] - shared local secret
//! - [`trust::TrustStoreLoader`] / [`trust::TrustStoreProvider`] - certificate trust store
//! - [`token::TokenStore`] - one-time token consumption
//! - [`realm::LocalIdentityStore`] / [`realm::IdentityRealmProvider`] - identity realms
//! - [`NodeRoleContext`] - role and secure-admin flags of this node
//! - [`MessageFormatter`] - operator-facing messages
//!
//! # Example
//!
//! ```ignore
//! use gatekeeper_auth::{AccessDecisionEngine, AccessLevel, AuthRequest};
//!
//! let engine = AccessDecisionEngine::builder()
//!     .local_secret(secret)
//!     .node(node_settings)
//!     .trust_store(loader)
//!     .token_store(tokens)
//!     .local_identity_store(keyfile)
//!     .realm(AdminRealm::local("admin-realm"))
//!     .admin_realm("admin-realm")
//!     .build()?;
//!
//! let access = engine.evaluate_admin_access("admin", "s3cret", "admin-realm", None)?;
//! assert_eq!(access, AccessLevel::Full);
//! ```

pub mod access;
pub mod cert;
pub mod engine;
pub mod error;
pub mod identity;
pub mod management;
pub mod messages;
pub mod node;
pub mod realm;
pub mod request;
pub mod token;
pub mod trust;

#[cfg(test)]
pub(crate) mod testing;

pub use access::{AccessLevel, Decision, DecisionBasis};
pub use cert::{CertError, identity_from_der};
pub use engine::{AccessDecisionEngine, EngineBuilder, LocalSecretProvider};
pub use error::AuthError;
pub use identity::TrustedIdentity;
pub use management::{ManagementAuthenticator, ManagementSession, SecurityDenied};
pub use messages::{DefaultMessages, MessageFormatter};
pub use node::{NodeRole, NodeRoleContext, NodeSettings};
pub use realm::{ADMIN_GROUP_NAME, AdminRealm, RealmKind};
pub use request::{ADMIN_INDICATOR_HEADER, AuthHeaders, AuthRequest, ONE_TIME_TOKEN_HEADER};
