//! The access decision engine.

use std::collections::HashMap;
use std::sync::Arc;

use crate::access::{AccessLevel, Decision, DecisionBasis};
use crate::error::AuthError;
use crate::identity::TrustedIdentity;
use crate::messages::{DefaultMessages, MessageFormatter};
use crate::node::NodeRoleContext;
use crate::realm::{AdminRealm, IdentityRealmProvider, LocalIdentityStore, RealmAuthenticator, RealmKind};
use crate::request::{AuthHeaders, AuthRequest};
use crate::token::{TokenGate, TokenStore};
use crate::trust::{PrincipalCache, TrustStoreLoader, TrustedSenderEvaluator};

/// Process-local shared secret held by automated local callers.
pub trait LocalSecretProvider: Send + Sync {
    /// Whether `candidate` is the local secret. Must compare in constant time.
    fn is_local_secret(&self, candidate: &str) -> bool;
}

/// Decides the administrative access level of requests.
///
/// The engine is `Send + Sync` and meant to be shared behind an `Arc`; every
/// evaluation is independent.
pub struct AccessDecisionEngine {
    local_secret: Arc<dyn LocalSecretProvider>,
    node: Arc<dyn NodeRoleContext>,
    senders: TrustedSenderEvaluator,
    realms: RealmAuthenticator,
    admin_realm: AdminRealm,
    messages: Arc<dyn MessageFormatter>,
}

impl AccessDecisionEngine {
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Name of the administrative realm.
    #[must_use]
    pub fn admin_realm_name(&self) -> &str {
        &self.admin_realm.name
    }

    #[must_use]
    pub fn messages(&self) -> &dyn MessageFormatter {
        self.messages.as_ref()
    }

    /// Evaluate a username/secret login with no headers and no transport
    /// identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TrustStore` if the trust store could not be read.
    pub fn evaluate_admin_access(
        &self,
        user: &str,
        secret: &str,
        realm: &str,
        origin_host: Option<&str>,
    ) -> Result<AccessLevel, AuthError> {
        self.evaluate(&AuthRequest::new(user, secret, realm, origin_host))
    }

    /// Evaluate a request carrying headers and, optionally, the identity
    /// established by the secure transport.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TrustStore` if the trust store could not be read.
    pub fn evaluate_admin_access_with(
        &self,
        user: &str,
        secret: &str,
        realm: &str,
        origin_host: Option<&str>,
        headers: AuthHeaders,
        identity: Option<TrustedIdentity>,
    ) -> Result<AccessLevel, AuthError> {
        let mut builder = AuthRequest::builder()
            .user(user)
            .secret(secret)
            .realm(realm)
            .headers(headers);
        if let Some(host) = origin_host {
            builder = builder.origin_host(host);
        }
        if let Some(identity) = identity {
            builder = builder.identity(identity);
        }
        self.evaluate(&builder.build())
    }

    /// Access level for `request`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TrustStore` if the trust store could not be read.
    pub fn evaluate(&self, request: &AuthRequest) -> Result<AccessLevel, AuthError> {
        self.decide(request).map(|decision| decision.access)
    }

    /// Access level for `request` together with the strategy that settled it.
    ///
    /// Strategies run in a fixed order and the first one that accepts wins.
    /// A rejected login is `Ok` with [`AccessLevel::None`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TrustStore` if the trust store could not be read.
    pub fn decide(&self, request: &AuthRequest) -> Result<Decision, AuthError> {
        if self.local_secret.is_local_secret(request.secret()) {
            tracing::debug!("Authenticated using local secret");
            return Ok(Decision::granted(AccessLevel::Full, DecisionBasis::LocalSecret));
        }

        let basis = self
            .senders
            .evaluate(request.headers(), request.identity())
            .map_err(|e| {
                tracing::warn!(error = %e, "Trust store unavailable, denying request");
                AuthError::from(e)
            })?;
        if let Some(basis) = basis {
            return Ok(Decision::granted(AccessLevel::Full, basis.into()));
        }

        let origin = request.origin_host();
        if !self.node.is_secure_admin_enabled() && !self.node.is_origin_local(origin) {
            tracing::info!(
                "{}",
                self.messages
                    .remote_login_rejected(origin.unwrap_or_default(), request.user())
            );
            return Ok(Decision::denied(DecisionBasis::PolicyDenied));
        }

        Ok(self.authenticate_with_realm(request))
    }

    fn authenticate_with_realm(&self, request: &AuthRequest) -> Decision {
        match self.admin_realm.kind {
            RealmKind::Local => {
                if self.realms.verify_local(request.user(), request.secret()) {
                    Decision::granted(AccessLevel::Full, DecisionBasis::LocalRealm)
                } else {
                    Decision::denied(DecisionBasis::CredentialDenied)
                }
            }
            RealmKind::Delegated {
                enforces_group_mapping,
            } => {
                let realm = if request.realm().is_empty() {
                    self.admin_realm.name.as_str()
                } else {
                    request.realm()
                };
                if !self.realms.verify_delegated(
                    request.user(),
                    request.secret(),
                    realm,
                    enforces_group_mapping,
                ) {
                    return Decision::denied(DecisionBasis::CredentialDenied);
                }

                let access = if self.node.is_coordinator() {
                    AccessLevel::Full
                } else {
                    AccessLevel::Monitoring
                };
                tracing::debug!(user = %request.user(), realm = %realm, access = %access, "Delegated realm login");
                Decision::granted(access, DecisionBasis::DelegatedRealm)
            }
        }
    }
}

impl std::fmt::Debug for AccessDecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessDecisionEngine")
            .field("admin_realm", &self.admin_realm)
            .field("senders", &self.senders)
            .field("realms", &self.realms)
            .finish_non_exhaustive()
    }
}

/// Wires the engine's collaborators.
///
/// Every inconsistency is reported by [`EngineBuilder::build`] as
/// [`AuthError::Configuration`].
#[derive(Default)]
pub struct EngineBuilder {
    local_secret: Option<Arc<dyn LocalSecretProvider>>,
    node: Option<Arc<dyn NodeRoleContext>>,
    trust_store: Option<Arc<dyn TrustStoreLoader>>,
    token_store: Option<Arc<dyn TokenStore>>,
    local_identity_store: Option<Arc<dyn LocalIdentityStore>>,
    realm_provider: Option<Arc<dyn IdentityRealmProvider>>,
    realms: Vec<AdminRealm>,
    admin_realm: Option<String>,
    messages: Option<Arc<dyn MessageFormatter>>,
}

impl EngineBuilder {
    #[must_use]
    pub fn local_secret(mut self, provider: Arc<dyn LocalSecretProvider>) -> Self {
        self.local_secret = Some(provider);
        self
    }

    #[must_use]
    pub fn node(mut self, node: Arc<dyn NodeRoleContext>) -> Self {
        self.node = Some(node);
        self
    }

    #[must_use]
    pub fn trust_store(mut self, loader: Arc<dyn TrustStoreLoader>) -> Self {
        self.trust_store = Some(loader);
        self
    }

    #[must_use]
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    #[must_use]
    pub fn local_identity_store(mut self, store: Arc<dyn LocalIdentityStore>) -> Self {
        self.local_identity_store = Some(store);
        self
    }

    #[must_use]
    pub fn realm_provider(mut self, provider: Arc<dyn IdentityRealmProvider>) -> Self {
        self.realm_provider = Some(provider);
        self
    }

    /// Register a configured realm.
    #[must_use]
    pub fn realm(mut self, realm: AdminRealm) -> Self {
        self.realms.push(realm);
        self
    }

    /// Select the administrative realm by name.
    #[must_use]
    pub fn admin_realm(mut self, name: impl Into<String>) -> Self {
        self.admin_realm = Some(name.into());
        self
    }

    /// Override the default English messages.
    #[must_use]
    pub fn messages(mut self, messages: Arc<dyn MessageFormatter>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if a required collaborator is
    /// missing, realm names are duplicated, the admin realm is not among the
    /// configured realms, or the admin realm's backend was not supplied.
    pub fn build(self) -> Result<AccessDecisionEngine, AuthError> {
        let local_secret = self
            .local_secret
            .ok_or_else(|| AuthError::configuration("no local secret provider"))?;
        let node = self
            .node
            .ok_or_else(|| AuthError::configuration("no node role context"))?;
        let trust_store = self
            .trust_store
            .ok_or_else(|| AuthError::configuration("no trust store loader"))?;
        let token_store = self
            .token_store
            .ok_or_else(|| AuthError::configuration("no token store"))?;
        let admin_name = self
            .admin_realm
            .ok_or_else(|| AuthError::configuration("no admin realm selected"))?;

        let mut realms: HashMap<String, AdminRealm> = HashMap::with_capacity(self.realms.len());
        for realm in self.realms {
            if realms.contains_key(&realm.name) {
                return Err(AuthError::configuration(format!(
                    "realm '{}' configured twice",
                    realm.name
                )));
            }
            realms.insert(realm.name.clone(), realm);
        }

        let admin_realm = realms.remove(&admin_name).ok_or_else(|| {
            AuthError::configuration(format!("admin realm '{admin_name}' is not a configured realm"))
        })?;

        let authenticator =
            RealmAuthenticator::new(self.local_identity_store, self.realm_provider);
        match admin_realm.kind {
            RealmKind::Local if !authenticator.has_local() => {
                return Err(AuthError::configuration(format!(
                    "admin realm '{admin_name}' is a local realm but no local identity store was supplied"
                )));
            }
            RealmKind::Delegated { .. } if !authenticator.has_delegated() => {
                return Err(AuthError::configuration(format!(
                    "admin realm '{admin_name}' is delegated but no login provider was supplied"
                )));
            }
            _ => {}
        }

        let senders = TrustedSenderEvaluator::new(
            Arc::clone(&node),
            PrincipalCache::new(trust_store),
            TokenGate::new(token_store),
        );

        tracing::debug!(admin_realm = %admin_realm.name, "Access decision engine ready");
        Ok(AccessDecisionEngine {
            local_secret,
            node,
            senders,
            realms: authenticator,
            admin_realm,
            messages: self
                .messages
                .unwrap_or_else(|| Arc::new(DefaultMessages)),
        })
    }
}
