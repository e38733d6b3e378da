//! Directory-backed certificate trust store.
//!
//! Each alias is a file in the trust store directory: `<alias>.der`,
//! `<alias>.pem` or `<alias>.crt` (DER or PEM), tried in that order. A PEM
//! block not labelled `CERTIFICATE` (e.g. a private key) is reported as a
//! non-certificate entry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gatekeeper_auth::trust::{TrustStoreEntry, TrustStoreError, TrustStoreLoader, TrustStoreProvider};
use x509_parser::pem::parse_x509_pem;

const EXTENSIONS: [&str; 3] = ["der", "pem", "crt"];
const PEM_CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Trust store reading alias files from a directory on every lookup.
#[derive(Debug, Clone)]
pub struct DirectoryTrustStore {
    dir: PathBuf,
}

impl DirectoryTrustStore {
    /// Open the trust store at `dir`.
    ///
    /// # Errors
    ///
    /// Returns `TrustStoreError::Unavailable` if `dir` is not a readable
    /// directory.
    pub fn open(dir: &Path) -> Result<Self, TrustStoreError> {
        let meta = std::fs::metadata(dir).map_err(|e| {
            TrustStoreError::Unavailable(format!("{}: {}", dir.display(), e))
        })?;
        if !meta.is_dir() {
            return Err(TrustStoreError::Unavailable(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Loader opening the directory on first use.
    pub fn loader(dir: PathBuf) -> Arc<dyn TrustStoreLoader> {
        Arc::new(move || -> Result<Arc<dyn TrustStoreProvider>, TrustStoreError> {
            let store = DirectoryTrustStore::open(&dir)?;
            tracing::debug!(dir = %dir.display(), "Opened trust store");
            Ok(Arc::new(store))
        })
    }

    fn alias_file(&self, alias: &str) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{alias}.{ext}")))
            .find(|path| path.is_file())
    }
}

/// Aliases are plain file stems; anything that could escape the directory
/// never matches.
fn is_valid_alias(alias: &str) -> bool {
    !alias.is_empty()
        && !alias.starts_with('.')
        && alias
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
}

/// Decode certificate file contents, PEM or DER.
pub fn decode_entry(bytes: &[u8]) -> Result<TrustStoreEntry, String> {
    if !looks_like_pem(bytes) {
        return Ok(TrustStoreEntry::Certificate(bytes.to_vec()));
    }

    let (_, pem) = parse_x509_pem(bytes).map_err(|e| format!("invalid PEM: {e}"))?;
    if pem.label == PEM_CERTIFICATE_LABEL {
        Ok(TrustStoreEntry::Certificate(pem.contents))
    } else {
        Ok(TrustStoreEntry::Other {
            kind: pem.label.to_lowercase(),
        })
    }
}

fn looks_like_pem(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"-----BEGIN ")
}

impl TrustStoreProvider for DirectoryTrustStore {
    fn certificate_for(&self, alias: &str) -> Result<Option<TrustStoreEntry>, TrustStoreError> {
        if !is_valid_alias(alias) {
            tracing::debug!(alias = %alias, "Ignoring invalid trust store alias");
            return Ok(None);
        }
        let Some(path) = self.alias_file(alias) else {
            return Ok(None);
        };

        let bytes = std::fs::read(&path).map_err(|e| TrustStoreError::Read {
            alias: alias.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })?;
        decode_entry(&bytes)
            .map(Some)
            .map_err(|reason| TrustStoreError::MalformedCertificate {
                alias: alias.to_string(),
                reason,
            })
    }
}
