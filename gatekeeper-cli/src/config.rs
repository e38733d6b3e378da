//! TOML configuration.
//!
//! ```toml
//! [node]
//! role = "coordinator"
//! secure_admin = false
//! admin_indicator = "3f1c..."
//! local_hosts = ["node1.example.com"]
//!
//! [admin]
//! realm = "admin-realm"
//!
//! [[realms]]
//! name = "admin-realm"
//! kind = "keyfile"
//! file = "admin-keyfile"
//!
//! [trust_store]
//! dir = "truststore"
//! ```
//!
//! Relative paths are resolved against the directory holding the config file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use gatekeeper_auth::NodeSettings;
use serde::{Deserialize, Serialize};

const CONFIG_FILENAME: &str = "gatekeeper.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub node: NodeSettings,

    pub admin: AdminSection,

    #[serde(default)]
    pub realms: Vec<RealmSection>,

    pub trust_store: TrustStoreSection,

    #[serde(default)]
    pub local_secret: LocalSecretSection,

    #[serde(default)]
    pub tokens: TokenSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminSection {
    /// Name of the realm administrators log in to.
    pub realm: String,

    /// Realm used by management connectors, if different.
    #[serde(default)]
    pub management_realm: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealmKindSetting {
    /// Local keyfile realm.
    Keyfile,
    /// Delegated realm, served here from a keyfile directory.
    Delegated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealmSection {
    pub name: String,
    pub kind: RealmKindSetting,
    pub file: PathBuf,

    /// Delegated realms only: require admin group membership in the session.
    #[serde(default)]
    pub group_mapping: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustStoreSection {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalSecretSection {
    /// Secret file; defaults to the user's runtime directory.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSection {
    #[serde(default = "default_token_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_token_capacity")]
    pub max_entries: usize,
}

fn default_token_ttl() -> u64 {
    60
}

fn default_token_capacity() -> usize {
    10_000
}

impl Default for TokenSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_token_ttl(),
            max_entries: default_token_capacity(),
        }
    }
}

impl Config {
    /// Load and validate the config at `path`, resolving relative paths.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()?;

        tracing::debug!(path = %path.display(), realms = config.realms.len(), "Loaded config");
        Ok(config)
    }

    /// Default config location in the user's config directory.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("org", "gatekeeper", "gatekeeper")
            .context("Could not determine config directory")?;
        Ok(dirs.config_dir().join(CONFIG_FILENAME))
    }

    /// Realm used by management connectors.
    pub fn management_realm(&self) -> &str {
        self.admin
            .management_realm
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.admin.realm)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for realm in &mut self.realms {
            realm.file = resolve(base, &realm.file);
        }
        self.trust_store.dir = resolve(base, &self.trust_store.dir);
        if let Some(file) = self.local_secret.file.as_mut() {
            *file = resolve(base, file);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.admin.realm.is_empty() {
            bail!("[admin] realm must not be empty");
        }
        if self.tokens.ttl_secs == 0 {
            bail!("[tokens] ttl_secs must be positive");
        }
        for realm in &self.realms {
            if realm.kind == RealmKindSetting::Keyfile && realm.group_mapping {
                bail!(
                    "realm '{}': group_mapping only applies to delegated realms",
                    realm.name
                );
            }
        }
        Ok(())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
