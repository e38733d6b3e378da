//! Process-local shared secret.
//!
//! Local tooling running as the same user reads the secret file and presents
//! its content as the password.
//!
//! # Security
//!
//! - The default location is `$XDG_RUNTIME_DIR` or `/run/user/$UID`, never `/tmp`
//! - File permissions: 0600, directory permissions: 0700
//! - Comparison is constant time

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use gatekeeper_auth::LocalSecretProvider;
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const LOCAL_SECRET_FILENAME: &str = "local-secret";
const SECRET_BYTES: usize = 32;

/// The local secret, loaded or created at startup.
pub struct LocalSecret {
    path: PathBuf,
    secret: String,
}

impl LocalSecret {
    /// Load the secret at `path`, creating it if missing or empty.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        let existing = match std::fs::read_to_string(path) {
            Ok(content) => Some(content.trim().to_string()).filter(|s| !s.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read local secret at {}", path.display()))
            }
        };

        let secret = match existing {
            Some(secret) => secret,
            None => {
                let secret = Self::generate_and_write(path)?;
                tracing::info!(path = %path.display(), "Created local secret");
                secret
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            secret,
        })
    }

    /// Load or create the secret in the user's runtime directory.
    pub fn in_runtime_dir() -> Result<Self> {
        let dir = secure_runtime_dir()?.join("gatekeeper");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        #[cfg(unix)]
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("Failed to restrict {}", dir.display()))?;

        Self::open_or_create(&dir.join(LOCAL_SECRET_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The secret as presented by local callers.
    pub fn value(&self) -> &str {
        &self.secret
    }

    fn generate_and_write(path: &Path) -> Result<String> {
        let mut random = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut random);
        let secret = URL_SAFE_NO_PAD.encode(random);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        std::fs::write(path, &secret)
            .with_context(|| format!("Failed to write local secret to {}", path.display()))?;

        #[cfg(unix)]
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict {}", path.display()))?;

        Ok(secret)
    }
}

impl LocalSecretProvider for LocalSecret {
    fn is_local_secret(&self, candidate: &str) -> bool {
        !candidate.is_empty() && candidate.as_bytes().ct_eq(self.secret.as_bytes()).into()
    }
}

impl std::fmt::Debug for LocalSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSecret")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// `$XDG_RUNTIME_DIR`, else `/run/user/$UID`; both must be owned by the
/// current user and not world-writable.
fn secure_runtime_dir() -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .into_iter()
        .collect();
    #[cfg(unix)]
    candidates.push(PathBuf::from(format!("/run/user/{}", unsafe { libc::getuid() })));

    match first_secure_dir(candidates)? {
        Some(dir) => Ok(dir),
        None => bail!(
            "No secure runtime directory available. Set $XDG_RUNTIME_DIR or [local_secret] file."
        ),
    }
}

fn first_secure_dir(candidates: impl IntoIterator<Item = PathBuf>) -> Result<Option<PathBuf>> {
    for dir in candidates {
        if !dir.is_dir() {
            continue;
        }
        if is_secure_directory(&dir)? {
            return Ok(Some(dir));
        }
        tracing::warn!(dir = %dir.display(), "Ignoring insecure runtime directory");
    }
    Ok(None)
}

#[cfg(unix)]
fn is_secure_directory(path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let meta = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let current_uid = unsafe { libc::getuid() };
    Ok(meta.uid() == current_uid && meta.mode() & 0o002 == 0)
}

#[cfg(not(unix))]
fn is_secure_directory(_path: &Path) -> Result<bool> {
    Ok(true)
}
