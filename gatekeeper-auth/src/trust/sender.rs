//! Trusted-sender evaluation.
//!
//! A trusted sender is another node of the cluster (or an automated local
//! caller) that does not present user credentials. It is recognised by one
//! of, in order:
//!
//! 1. the transport identity matching the peer's certificate in the trust store
//! 2. the admin indicator header, only while secure admin is disabled
//! 3. a one-time token, consumed on acceptance
//!
//! The certificate and indicator paths are policy alternatives: the indicator
//! is never consulted once secure admin is enabled.

use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::identity::TrustedIdentity;
use crate::node::NodeRoleContext;
use crate::request::{ADMIN_INDICATOR_HEADER, AuthHeaders, ONE_TIME_TOKEN_HEADER};
use crate::token::TokenGate;

use super::principal_cache::PrincipalCache;
use super::store::TrustStoreError;

/// How a request was recognised as a trusted sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustBasis {
    Certificate,
    AdminIndicator,
    OneTimeToken,
}

/// Decides whether a request comes from a trusted sender.
pub struct TrustedSenderEvaluator {
    node: Arc<dyn NodeRoleContext>,
    principals: PrincipalCache,
    tokens: TokenGate,
}

impl TrustedSenderEvaluator {
    #[must_use]
    pub fn new(node: Arc<dyn NodeRoleContext>, principals: PrincipalCache, tokens: TokenGate) -> Self {
        Self {
            node,
            principals,
            tokens,
        }
    }

    /// Evaluate the trusted-sender paths in order.
    ///
    /// Returns the basis of the first path that accepts, or `None`. A
    /// presented one-time token is consumed only if both earlier paths failed.
    ///
    /// # Errors
    ///
    /// Returns a `TrustStoreError` if the certificate path could not consult
    /// the trust store.
    pub fn evaluate(
        &self,
        headers: &AuthHeaders,
        request_identity: Option<&TrustedIdentity>,
    ) -> Result<Option<TrustBasis>, TrustStoreError> {
        if let Some(identity) = request_identity {
            if self.matches_peer_certificate(identity)? {
                tracing::debug!(principal = %identity, "Authenticated client certificate principal");
                return Ok(Some(TrustBasis::Certificate));
            }
        }

        if !self.node.is_secure_admin_enabled()
            && self.matches_admin_indicator(headers.get(ADMIN_INDICATOR_HEADER))
        {
            tracing::debug!("Authenticated peer using admin indicator header");
            return Ok(Some(TrustBasis::AdminIndicator));
        }

        if self.tokens.accept(headers.get(ONE_TIME_TOKEN_HEADER)) {
            tracing::debug!("Authenticated using one-time token");
            return Ok(Some(TrustBasis::OneTimeToken));
        }

        Ok(None)
    }

    /// Alias whose certificate a peer of this node presents: instances talk to
    /// the coordinator and vice versa.
    fn peer_alias(&self) -> &str {
        if self.node.is_coordinator() {
            self.node.instance_alias()
        } else {
            self.node.coordinator_alias()
        }
    }

    fn matches_peer_certificate(&self, identity: &TrustedIdentity) -> Result<bool, TrustStoreError> {
        let alias = self.peer_alias();
        if alias.is_empty() {
            return Ok(false);
        }
        Ok(self
            .principals
            .resolve(alias)?
            .is_some_and(|expected| expected == *identity))
    }

    fn matches_admin_indicator(&self, candidate: Option<&str>) -> bool {
        match (candidate, self.node.configured_indicator()) {
            (Some(candidate), Some(configured)) if !configured.is_empty() => {
                candidate.as_bytes().ct_eq(configured.as_bytes()).into()
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for TrustedSenderEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustedSenderEvaluator")
            .field("principals", &self.principals)
            .finish_non_exhaustive()
    }
}
