//! Role and policy flags of the node evaluating requests.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Role of a node in the managed cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// The administration coordinator of the domain.
    Coordinator,
    /// A managed instance.
    Instance,
}

/// Read-only view of this node's role and admin settings.
pub trait NodeRoleContext: Send + Sync {
    fn is_coordinator(&self) -> bool;

    fn is_secure_admin_enabled(&self) -> bool;

    /// Trust store alias of the coordinator's certificate.
    fn coordinator_alias(&self) -> &str;

    /// Trust store alias of the instances' certificate.
    fn instance_alias(&self) -> &str;

    /// Admin indicator value peers send while secure admin is disabled.
    fn configured_indicator(&self) -> Option<&str>;

    /// Whether a request from `host` originates on this machine.
    ///
    /// `None` means the request did not come over the network.
    fn is_origin_local(&self, host: Option<&str>) -> bool;
}

fn default_coordinator_alias() -> String {
    "coordinator".to_string()
}

fn default_instance_alias() -> String {
    "instance".to_string()
}

/// Static node settings, usually read from configuration.
///
/// # Locality
///
/// A request is local when it has no origin host, comes from `localhost` or
/// a loopback address, or comes from an entry of `local_hosts`. This crate
/// does not enumerate network interfaces: a request from one of the node's
/// own LAN addresses is remote unless that address is in `local_hosts`.
/// Embedders add them with [`NodeSettings::with_local_addresses`]; the
/// `gatekeeper` binary does so at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    pub role: NodeRole,

    #[serde(default)]
    pub secure_admin: bool,

    #[serde(default = "default_coordinator_alias")]
    pub coordinator_alias: String,

    #[serde(default = "default_instance_alias")]
    pub instance_alias: String,

    #[serde(default)]
    pub admin_indicator: Option<String>,

    /// Additional host names and addresses that refer to this machine.
    /// Addresses are compared as addresses, so `fe80::0001` matches `fe80::1`.
    #[serde(default)]
    pub local_hosts: Vec<String>,
}

impl NodeSettings {
    /// Settings for `role` with secure admin disabled and default aliases.
    #[must_use]
    pub fn new(role: NodeRole) -> Self {
        Self {
            role,
            secure_admin: false,
            coordinator_alias: default_coordinator_alias(),
            instance_alias: default_instance_alias(),
            admin_indicator: None,
            local_hosts: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_secure_admin(mut self, enabled: bool) -> Self {
        self.secure_admin = enabled;
        self
    }

    #[must_use]
    pub fn with_indicator(mut self, indicator: impl Into<String>) -> Self {
        self.admin_indicator = Some(indicator.into());
        self
    }

    #[must_use]
    pub fn with_local_host(mut self, host: impl Into<String>) -> Self {
        self.local_hosts.push(host.into());
        self
    }

    /// Treat each of `addrs` as this machine, skipping ones already listed.
    #[must_use]
    pub fn with_local_addresses(mut self, addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        for addr in addrs {
            if !self.local_hosts.iter().any(|h| parse_ip(h) == Some(addr)) {
                self.local_hosts.push(addr.to_string());
            }
        }
        self
    }
}

/// An IP literal, with or without IPv6 brackets.
fn parse_ip(host: &str) -> Option<IpAddr> {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .ok()
}

impl NodeRoleContext for NodeSettings {
    fn is_coordinator(&self) -> bool {
        self.role == NodeRole::Coordinator
    }

    fn is_secure_admin_enabled(&self) -> bool {
        self.secure_admin
    }

    fn coordinator_alias(&self) -> &str {
        &self.coordinator_alias
    }

    fn instance_alias(&self) -> &str {
        &self.instance_alias
    }

    fn configured_indicator(&self) -> Option<&str> {
        self.admin_indicator.as_deref()
    }

    fn is_origin_local(&self, host: Option<&str>) -> bool {
        let host = match host.map(str::trim) {
            None | Some("") => return true,
            Some(host) => host,
        };

        if host.eq_ignore_ascii_case("localhost") {
            return true;
        }

        let addr = parse_ip(host);
        if addr.is_some_and(|addr| addr.is_loopback()) {
            return true;
        }

        self.local_hosts.iter().any(|local| match addr {
            Some(addr) => parse_ip(local) == Some(addr),
            None => local.eq_ignore_ascii_case(host),
        })
    }
}
