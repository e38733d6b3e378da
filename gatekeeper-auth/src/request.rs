//! Administrative requests as seen by the decision engine.

use std::collections::HashMap;

use crate::identity::TrustedIdentity;

/// Header carrying the admin indicator sent by peer nodes when secure admin
/// is disabled.
pub const ADMIN_INDICATOR_HEADER: &str = "X-Admin-Indicator";

/// Header carrying a one-time authentication token.
pub const ONE_TIME_TOKEN_HEADER: &str = "X-Admin-Auth-Token";

/// Authentication-related request headers.
///
/// Header names are matched ASCII case-insensitively, the way HTTP treats them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders(HashMap<String, String>);

impl AuthHeaders {
    /// Empty header set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any earlier value with the same name.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Look up a header value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for AuthHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// An incoming administrative request's claimed identity.
///
/// Immutable once built. An absent origin host means the request did not
/// arrive over the network (e.g. an in-process connector).
#[derive(Clone, Default)]
pub struct AuthRequest {
    user: String,
    secret: String,
    realm: String,
    origin_host: Option<String>,
    headers: AuthHeaders,
    identity: Option<TrustedIdentity>,
}

impl AuthRequest {
    /// Start building a request.
    #[must_use]
    pub fn builder() -> AuthRequestBuilder {
        AuthRequestBuilder::default()
    }

    /// Request with no headers and no transport identity.
    #[must_use]
    pub fn new(
        user: impl Into<String>,
        secret: impl Into<String>,
        realm: impl Into<String>,
        origin_host: Option<&str>,
    ) -> Self {
        Self {
            user: user.into(),
            secret: secret.into(),
            realm: realm.into(),
            origin_host: origin_host.map(str::to_string),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    #[must_use]
    pub fn origin_host(&self) -> Option<&str> {
        self.origin_host.as_deref()
    }

    #[must_use]
    pub fn headers(&self) -> &AuthHeaders {
        &self.headers
    }

    /// Identity reported by the secure transport, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&TrustedIdentity> {
        self.identity.as_ref()
    }
}

impl std::fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRequest")
            .field("user", &self.user)
            .field("realm", &self.realm)
            .field("origin_host", &self.origin_host)
            .field("headers", &self.headers.len())
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AuthRequest`].
#[derive(Default)]
pub struct AuthRequestBuilder {
    request: AuthRequest,
}

impl AuthRequestBuilder {
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.request.user = user.into();
        self
    }

    #[must_use]
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.request.secret = secret.into();
        self
    }

    #[must_use]
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.request.realm = realm.into();
        self
    }

    #[must_use]
    pub fn origin_host(mut self, host: impl Into<String>) -> Self {
        self.request.origin_host = Some(host.into());
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: AuthHeaders) -> Self {
        self.request.headers = headers;
        self
    }

    #[must_use]
    pub fn identity(mut self, identity: TrustedIdentity) -> Self {
        self.request.identity = Some(identity);
        self
    }

    #[must_use]
    pub fn build(self) -> AuthRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_ignores_case() {
        let headers: AuthHeaders = [("x-admin-auth-token", "abc")].into_iter().collect();
        assert_eq!(headers.get(ONE_TIME_TOKEN_HEADER), Some("abc"));
        assert_eq!(headers.get("X-ADMIN-AUTH-TOKEN"), Some("abc"));
        assert_eq!(headers.get(ADMIN_INDICATOR_HEADER), None);
    }

    #[test]
    fn test_builder() {
        let request = AuthRequest::builder()
            .user("admin")
            .secret("s3cret")
            .realm("admin-realm")
            .origin_host("10.0.0.7")
            .header(ADMIN_INDICATOR_HEADER, "marker")
            .identity(TrustedIdentity::new("CN=peer"))
            .build();

        assert_eq!(request.user(), "admin");
        assert_eq!(request.secret(), "s3cret");
        assert_eq!(request.realm(), "admin-realm");
        assert_eq!(request.origin_host(), Some("10.0.0.7"));
        assert_eq!(request.headers().get(ADMIN_INDICATOR_HEADER), Some("marker"));
        assert_eq!(request.identity(), Some(&TrustedIdentity::new("CN=peer")));
    }

    #[test]
    fn test_debug_hides_secret() {
        let request = AuthRequest::new("admin", "hunter2", "admin-realm", None);
        let debug = format!("{request:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }
}
