//! Operator-facing messages.
//!
//! Messages are produced by an injected formatter rather than a global
//! catalogue, so embedders can localize them.

/// Produces the messages the engine logs or returns to callers.
pub trait MessageFormatter: Send + Sync {
    /// Logged when a remote username/password login is refused because
    /// secure admin is disabled.
    fn remote_login_rejected(&self, origin_host: &str, user: &str) -> String;

    /// Returned by the management adapter when access is denied.
    fn access_denied(&self, user: &str) -> String;
}

/// English messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMessages;

impl MessageFormatter for DefaultMessages {
    fn remote_login_rejected(&self, origin_host: &str, user: &str) -> String {
        format!(
            "Remote admin log-in attempt from host {origin_host} with username \"{user}\" rejected because secure admin is disabled"
        )
    }

    fn access_denied(&self, user: &str) -> String {
        format!("User [{user}] does not have administration access")
    }
}
