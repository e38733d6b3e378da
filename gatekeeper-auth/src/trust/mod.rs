//! Certificate trust and trusted-sender detection.

mod principal_cache;
mod sender;
mod store;

pub use principal_cache::PrincipalCache;
pub use sender::{TrustBasis, TrustedSenderEvaluator};
pub use store::{TrustStoreEntry, TrustStoreError, TrustStoreLoader, TrustStoreProvider};
