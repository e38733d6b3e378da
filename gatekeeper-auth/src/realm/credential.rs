//! Salted password hashes stored in identity realms.
//!
//! Format: `{SSHA256}` followed by standard base64 of `sha256(secret || salt) || salt`.

use base64::prelude::*;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Scheme prefix of stored credentials.
pub const SSHA256_PREFIX: &str = "{SSHA256}";

const HASH_LEN: usize = 32;
const SALT_LEN: usize = 8;

/// Errors parsing a stored credential.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CredentialError {
    #[error("unsupported credential scheme")]
    UnsupportedScheme,

    #[error("invalid credential encoding")]
    InvalidEncoding,

    #[error("credential too short: {0} bytes")]
    TooShort(usize),
}

/// A salted SHA-256 password hash.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCredential {
    hash: [u8; HASH_LEN],
    salt: Vec<u8>,
}

impl StoredCredential {
    /// Hash `secret` with a fresh random salt.
    #[must_use]
    pub fn generate(secret: &str) -> Self {
        let mut salt = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        Self::with_salt(secret, salt)
    }

    /// Hash `secret` with the given salt.
    #[must_use]
    pub fn with_salt(secret: &str, salt: Vec<u8>) -> Self {
        Self {
            hash: Self::digest(secret, &salt),
            salt,
        }
    }

    /// Parse the `{SSHA256}...` text form.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is missing, the base64 is invalid, or the
    /// decoded value is shorter than a hash.
    pub fn parse(encoded: &str) -> Result<Self, CredentialError> {
        let body = encoded
            .trim()
            .strip_prefix(SSHA256_PREFIX)
            .ok_or(CredentialError::UnsupportedScheme)?;
        let bytes = BASE64_STANDARD
            .decode(body)
            .map_err(|_| CredentialError::InvalidEncoding)?;
        if bytes.len() <= HASH_LEN {
            return Err(CredentialError::TooShort(bytes.len()));
        }

        let (hash, salt) = bytes.split_at(HASH_LEN);
        let hash: [u8; HASH_LEN] = hash.try_into().map_err(|_| CredentialError::InvalidEncoding)?;
        Ok(Self {
            hash,
            salt: salt.to_vec(),
        })
    }

    /// Check `secret` against the stored hash in constant time.
    #[must_use]
    pub fn verify(&self, secret: &str) -> bool {
        let candidate = Self::digest(secret, &self.salt);
        candidate.ct_eq(&self.hash).into()
    }

    fn digest(secret: &str, salt: &[u8]) -> [u8; HASH_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.update(salt);
        hasher.finalize().into()
    }
}

impl std::fmt::Display for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut bytes = Vec::with_capacity(HASH_LEN + self.salt.len());
        bytes.extend_from_slice(&self.hash);
        bytes.extend_from_slice(&self.salt);
        write!(f, "{}{}", SSHA256_PREFIX, BASE64_STANDARD.encode(bytes))
    }
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StoredCredential(..)")
    }
}
