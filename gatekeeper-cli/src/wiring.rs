//! Builds the decision engine from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gatekeeper_auth::realm::LocalIdentityStore;
use gatekeeper_auth::token::MemoryTokenStore;
use gatekeeper_auth::{AccessDecisionEngine, AdminRealm, ManagementAuthenticator, NodeSettings};

use crate::config::{Config, RealmKindSetting};
use crate::interfaces;
use crate::keyfile::{Keyfile, KeyfileDirectory};
use crate::local_secret::LocalSecret;
use crate::truststore::DirectoryTrustStore;

/// The engine and the collaborators the CLI talks to directly.
pub struct Runtime {
    pub engine: Arc<AccessDecisionEngine>,
    pub tokens: Arc<MemoryTokenStore>,
    pub local_secret: Arc<LocalSecret>,
    pub management: ManagementAuthenticator,
}

pub fn build(config: &Config) -> Result<Runtime> {
    let local_secret = Arc::new(match &config.local_secret.file {
        Some(path) => LocalSecret::open_or_create(path)?,
        None => LocalSecret::in_runtime_dir()?,
    });

    let tokens = Arc::new(MemoryTokenStore::new(
        Duration::from_secs(config.tokens.ttl_secs),
        config.tokens.max_entries,
    ));

    let mut builder = AccessDecisionEngine::builder()
        .local_secret(local_secret.clone())
        .node(Arc::new(node_settings(config)))
        .trust_store(DirectoryTrustStore::loader(config.trust_store.dir.clone()))
        .token_store(tokens.clone())
        .admin_realm(config.admin.realm.clone());

    let mut local: Option<Arc<dyn LocalIdentityStore>> = None;
    let mut directory = KeyfileDirectory::new();
    for realm in &config.realms {
        let keyfile = Keyfile::load(&realm.file)
            .with_context(|| format!("Failed to load realm '{}'", realm.name))?;
        tracing::debug!(realm = %realm.name, path = %keyfile.path().display(), "Loaded keyfile");
        match realm.kind {
            RealmKindSetting::Keyfile => {
                if realm.name == config.admin.realm {
                    local = Some(Arc::new(keyfile));
                }
                builder = builder.realm(AdminRealm::local(realm.name.clone()));
            }
            RealmKindSetting::Delegated => {
                directory.insert(realm.name.clone(), keyfile);
                builder = builder.realm(AdminRealm::delegated(
                    realm.name.clone(),
                    realm.group_mapping,
                ));
            }
        }
    }

    if let Some(store) = local {
        builder = builder.local_identity_store(store);
    }
    if !directory.is_empty() {
        builder = builder.realm_provider(Arc::new(directory));
    }

    let engine = Arc::new(builder.build().context("Invalid access configuration")?);
    let management =
        ManagementAuthenticator::new(engine.clone()).with_realm(config.management_realm());

    Ok(Runtime {
        engine,
        tokens,
        local_secret,
        management,
    })
}

/// Configured node settings plus this machine's interface addresses.
fn node_settings(config: &Config) -> NodeSettings {
    match interfaces::local_addresses() {
        Ok(addresses) => {
            tracing::debug!(count = addresses.len(), "Treating interface addresses as local");
            config.node.clone().with_local_addresses(addresses)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot list interface addresses, only configured hosts are local");
            config.node.clone()
        }
    }
}
