//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::engine::LocalSecretProvider;
use crate::realm::{
    ADMIN_GROUP_NAME, AuthenticatedSession, IdentityRealmProvider, IdentityStoreError,
    LocalIdentityStore, LoginError, RealmUser, SessionPrincipal, StoredCredential,
};
use crate::trust::{TrustStoreEntry, TrustStoreError, TrustStoreLoader, TrustStoreProvider};

/// DER of a self-signed certificate whose subject is `CN=<cn>`.
pub fn self_signed_der(cn: &str) -> Vec<u8> {
    self_signed_der_with(&[(rcgen::DnType::CommonName, cn)])
}

/// DER of a self-signed certificate with the given subject attributes, in order.
pub fn self_signed_der_with(subject: &[(rcgen::DnType, &str)]) -> Vec<u8> {
    let key = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
    let mut name = rcgen::DistinguishedName::new();
    for (kind, value) in subject {
        name.push(kind.clone(), *value);
    }
    params.distinguished_name = name;
    params.self_signed(&key).unwrap().der().to_vec()
}

/// Shared call counter.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Trust store backed by a map, counting lookups.
#[derive(Debug, Default)]
pub struct MapTrustStore {
    entries: HashMap<String, TrustStoreEntry>,
    lookups: Counter,
}

impl MapTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_certificate(mut self, alias: &str, der: Vec<u8>) -> Self {
        self.entries
            .insert(alias.to_string(), TrustStoreEntry::Certificate(der));
        self
    }

    pub fn with_other(mut self, alias: &str, kind: &str) -> Self {
        self.entries.insert(
            alias.to_string(),
            TrustStoreEntry::Other {
                kind: kind.to_string(),
            },
        );
        self
    }

    pub fn lookup_counter(&self) -> Counter {
        self.lookups.clone()
    }
}

impl TrustStoreProvider for MapTrustStore {
    fn certificate_for(&self, alias: &str) -> Result<Option<TrustStoreEntry>, TrustStoreError> {
        self.lookups.bump();
        Ok(self.entries.get(alias).cloned())
    }
}

/// Loader handing out one store, optionally failing the first few loads.
pub struct CountingLoader {
    store: Arc<dyn TrustStoreProvider>,
    fail_first: usize,
    loads: Counter,
}

impl CountingLoader {
    pub fn new(store: MapTrustStore) -> Self {
        Self {
            store: Arc::new(store),
            fail_first: 0,
            loads: Counter::default(),
        }
    }

    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.get()
    }
}

impl TrustStoreLoader for CountingLoader {
    fn load(&self) -> Result<Arc<dyn TrustStoreProvider>, TrustStoreError> {
        let attempt = self.loads.bump();
        if attempt < self.fail_first {
            return Err(TrustStoreError::Unavailable("keystore locked".to_string()));
        }
        Ok(Arc::clone(&self.store))
    }
}

/// A member of the admin group with the given secret.
pub fn admin_user(name: &str, secret: &str) -> RealmUser {
    RealmUser::new(name, [ADMIN_GROUP_NAME], StoredCredential::generate(secret))
}

/// Local identity store held in memory, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    users: Vec<RealmUser>,
    malformed: Vec<String>,
    failing: bool,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: RealmUser) -> Self {
        self.users.push(user);
        self
    }

    /// List `name` but fail to read its record.
    pub fn with_malformed(mut self, name: &str) -> Self {
        self.malformed.push(name.to_string());
        self
    }

    /// Every read fails.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

impl LocalIdentityStore for MemoryIdentityStore {
    fn user_by_name(&self, name: &str) -> Result<Option<RealmUser>, IdentityStoreError> {
        if self.failing {
            return Err(IdentityStoreError::Unavailable("keyfile unreadable".to_string()));
        }
        if self.malformed.iter().any(|m| m == name) {
            return Err(IdentityStoreError::MalformedRecord {
                user: name.to_string(),
                reason: "unparseable credential".to_string(),
            });
        }
        Ok(self.users.iter().find(|u| u.name() == name).cloned())
    }

    fn all_usernames(&self) -> Result<Vec<String>, IdentityStoreError> {
        if self.failing {
            return Err(IdentityStoreError::Unavailable("keyfile unreadable".to_string()));
        }
        Ok(self
            .users
            .iter()
            .map(|u| u.name().to_string())
            .chain(self.malformed.iter().cloned())
            .collect())
    }
}

struct FakeUser {
    secret: String,
    principals: Vec<SessionPrincipal>,
}

struct FakeSession {
    principals: Vec<SessionPrincipal>,
    fail_scan: bool,
}

impl AuthenticatedSession for FakeSession {
    fn principals(&self) -> Result<Vec<SessionPrincipal>, LoginError> {
        if self.fail_scan {
            return Err(LoginError::Provider("principal scan failed".to_string()));
        }
        Ok(self.principals.clone())
    }
}

/// Delegated login provider with a fixed user table, counting logins.
#[derive(Default)]
pub struct FakeRealmProvider {
    users: HashMap<String, FakeUser>,
    fail_scan: bool,
    logins: Counter,
}

impl FakeRealmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, name: &str, secret: &str, principals: Vec<SessionPrincipal>) -> Self {
        self.users.insert(
            name.to_string(),
            FakeUser {
                secret: secret.to_string(),
                principals,
            },
        );
        self
    }

    /// Sessions fail when asked for their principals.
    pub fn failing_principal_scan(mut self) -> Self {
        self.fail_scan = true;
        self
    }

    pub fn login_counter(&self) -> Counter {
        self.logins.clone()
    }
}

impl IdentityRealmProvider for FakeRealmProvider {
    fn login(
        &self,
        user: &str,
        secret: &str,
        _realm: &str,
    ) -> Result<Box<dyn AuthenticatedSession>, LoginError> {
        self.logins.bump();
        match self.users.get(user) {
            Some(record) if record.secret == secret => Ok(Box::new(FakeSession {
                principals: record.principals.clone(),
                fail_scan: self.fail_scan,
            })),
            _ => Err(LoginError::Rejected),
        }
    }
}

/// Local secret fixed at construction.
pub struct StaticSecret(pub &'static str);

impl LocalSecretProvider for StaticSecret {
    fn is_local_secret(&self, candidate: &str) -> bool {
        !candidate.is_empty() && candidate == self.0
    }
}
