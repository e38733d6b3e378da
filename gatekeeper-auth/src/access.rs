//! Access levels and the decisions that produce them.

use serde::{Deserialize, Serialize};

use crate::trust::TrustBasis;

/// Level of administrative access granted to a request.
///
/// Levels are totally ordered: `None < Monitoring < Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// No administrative access.
    None,
    /// Read-only monitoring access.
    Monitoring,
    /// Full administrative access.
    Full,
}

impl AccessLevel {
    /// Whether any access at all was granted.
    #[must_use]
    pub fn is_granted(self) -> bool {
        self != Self::None
    }

    /// Lowercase name used in logs and CLI output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Monitoring => "monitoring",
            Self::Full => "full",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which strategy settled an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DecisionBasis {
    /// The secret matched the process-local shared secret.
    LocalSecret,
    /// The transport identity matched the peer certificate in the trust store.
    Certificate,
    /// The admin indicator header matched the configured value.
    AdminIndicator,
    /// A one-time token was presented and consumed.
    OneTimeToken,
    /// The local keyfile realm accepted the credentials.
    LocalRealm,
    /// The delegated login provider accepted the credentials.
    DelegatedRealm,
    /// Remote username/password login refused because secure admin is off.
    PolicyDenied,
    /// Credentials were wrong, unknown, or lacked admin group membership.
    CredentialDenied,
}

impl From<TrustBasis> for DecisionBasis {
    fn from(basis: TrustBasis) -> Self {
        match basis {
            TrustBasis::Certificate => Self::Certificate,
            TrustBasis::AdminIndicator => Self::AdminIndicator,
            TrustBasis::OneTimeToken => Self::OneTimeToken,
        }
    }
}

/// Outcome of one evaluation: the access level and how it was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Granted access level.
    pub access: AccessLevel,
    /// Strategy that settled the evaluation.
    pub basis: DecisionBasis,
}

impl Decision {
    pub(crate) fn granted(access: AccessLevel, basis: DecisionBasis) -> Self {
        Self { access, basis }
    }

    pub(crate) fn denied(basis: DecisionBasis) -> Self {
        Self {
            access: AccessLevel::None,
            basis,
        }
    }
}
