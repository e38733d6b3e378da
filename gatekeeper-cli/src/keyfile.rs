//! Keyfile-backed identity realms.
//!
//! One user per line:
//!
//! ```text
//! # name;credential;groups
//! admin;{SSHA256}q8yT...;asadmin
//! ops;{SSHA256}9F2c...;staff,monitor
//! ```
//!
//! Blank lines and `#` comments are skipped. A malformed line is logged. If it
//! names a user, that name stays listed but its record reads as
//! [`IdentityStoreError::MalformedRecord`]: the user is locked out and no
//! default admin user can be chosen from the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gatekeeper_auth::realm::{
    AuthenticatedSession, IdentityRealmProvider, IdentityStoreError, LocalIdentityStore, LoginError,
    RealmUser, SessionPrincipal, StoredCredential,
};

/// One named keyfile line.
#[derive(Debug, Clone)]
enum Record {
    User(RealmUser),
    Malformed { name: String, reason: String },
}

impl Record {
    fn name(&self) -> &str {
        match self {
            Record::User(user) => user.name(),
            Record::Malformed { name, .. } => name,
        }
    }
}

/// Users parsed from one keyfile, in file order.
#[derive(Debug, Clone)]
pub struct Keyfile {
    path: PathBuf,
    records: Vec<Record>,
}

impl Keyfile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read keyfile at {}", path.display()))?;
        Ok(Self::parse(path, &content))
    }

    fn parse(path: &Path, content: &str) -> Self {
        let mut records: Vec<Record> = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record = match parse_line(line) {
                Ok(user) => Record::User(user),
                Err(reason) => {
                    tracing::warn!(path = %path.display(), line = index + 1, reason = %reason, "Malformed keyfile line");
                    match line_user_name(line) {
                        Some(name) => Record::Malformed {
                            name: name.to_string(),
                            reason,
                        },
                        None => continue,
                    }
                }
            };
            if records.iter().any(|r| r.name() == record.name()) {
                tracing::warn!(path = %path.display(), line = index + 1, user = %record.name(), "Duplicate keyfile user, keeping the first");
                continue;
            }
            records.push(record);
        }
        Self {
            path: path.to_path_buf(),
            records,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(&self, name: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.name() == name)
    }

    fn find(&self, name: &str) -> Option<&RealmUser> {
        match self.record(name)? {
            Record::User(user) => Some(user),
            Record::Malformed { .. } => None,
        }
    }
}

/// The user a line is about, when it has a name field at all.
fn line_user_name(line: &str) -> Option<&str> {
    let (name, _) = line.split_once(';')?;
    Some(name.trim()).filter(|name| !name.is_empty())
}

fn parse_line(line: &str) -> Result<RealmUser, String> {
    let mut fields = line.splitn(3, ';');
    let name = fields.next().unwrap_or_default().trim();
    let credential = fields.next().ok_or("missing credential field")?.trim();
    let groups = fields.next().unwrap_or_default();

    if name.is_empty() {
        return Err("empty user name".to_string());
    }
    let credential = StoredCredential::parse(credential).map_err(|e| e.to_string())?;
    let groups = groups
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty());

    Ok(RealmUser::new(name, groups, credential))
}

/// Format one keyfile line.
pub fn format_line(name: &str, credential: &StoredCredential, groups: &[String]) -> String {
    format!("{};{};{}", name, credential, groups.join(","))
}

impl LocalIdentityStore for Keyfile {
    fn user_by_name(&self, name: &str) -> Result<Option<RealmUser>, IdentityStoreError> {
        match self.record(name) {
            None => Ok(None),
            Some(Record::User(user)) => Ok(Some(user.clone())),
            Some(Record::Malformed { name, reason }) => Err(IdentityStoreError::MalformedRecord {
                user: name.clone(),
                reason: reason.clone(),
            }),
        }
    }

    fn all_usernames(&self) -> Result<Vec<String>, IdentityStoreError> {
        Ok(self.records.iter().map(|r| r.name().to_string()).collect())
    }
}

/// Delegated login provider serving one keyfile per realm.
///
/// Sessions carry the user principal and one group principal per keyfile
/// group.
#[derive(Debug, Default)]
pub struct KeyfileDirectory {
    realms: HashMap<String, Keyfile>,
}

impl KeyfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, realm: impl Into<String>, keyfile: Keyfile) {
        self.realms.insert(realm.into(), keyfile);
    }

    pub fn is_empty(&self) -> bool {
        self.realms.is_empty()
    }
}

struct KeyfileSession {
    principals: Vec<SessionPrincipal>,
}

impl AuthenticatedSession for KeyfileSession {
    fn principals(&self) -> Result<Vec<SessionPrincipal>, LoginError> {
        Ok(self.principals.clone())
    }
}

impl IdentityRealmProvider for KeyfileDirectory {
    fn login(
        &self,
        user: &str,
        secret: &str,
        realm: &str,
    ) -> Result<Box<dyn AuthenticatedSession>, LoginError> {
        let keyfile = self
            .realms
            .get(realm)
            .ok_or_else(|| LoginError::UnknownRealm(realm.to_string()))?;
        let record = keyfile.find(user).ok_or(LoginError::Rejected)?;
        if !record.verify_secret(secret) {
            return Err(LoginError::Rejected);
        }

        let principals = std::iter::once(SessionPrincipal::User(record.name().to_string()))
            .chain(record.groups().iter().cloned().map(SessionPrincipal::Group))
            .collect();
        Ok(Box::new(KeyfileSession { principals }))
    }
}
