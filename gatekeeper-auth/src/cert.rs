//! Sender identity from a client certificate.
//!
//! The identity is the certificate's subject DN rendered as a string, e.g.
//! `CN=node-a, O=Example, C=US`. Two certificates with the same subject name
//! the same sender; chain validation is the transport's job.

use thiserror::Error;
use x509_parser::objects::oid_registry;
use x509_parser::prelude::*;

use crate::identity::TrustedIdentity;

/// Largest DER input accepted.
pub const MAX_CERT_SIZE: usize = 16 * 1024;

/// Why a certificate yields no identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertError {
    #[error("certificate too large: {0} bytes (max {MAX_CERT_SIZE})")]
    TooLarge(usize),

    #[error("failed to parse X.509 certificate: {0}")]
    ParseError(String),

    #[error("{0} bytes after the certificate")]
    TrailingData(usize),

    #[error("certificate subject is empty")]
    EmptySubject,

    #[error("certificate subject cannot be rendered: {0}")]
    UnreadableSubject(String),
}

/// The subject DN of a DER-encoded X.509 certificate, as a sender identity.
///
/// # Errors
///
/// Fails on oversized or malformed input and on a subject that is empty or
/// holds attribute values that cannot be rendered. Such certificates never
/// identify anyone.
pub fn identity_from_der(cert_der: &[u8]) -> Result<TrustedIdentity, CertError> {
    if cert_der.len() > MAX_CERT_SIZE {
        return Err(CertError::TooLarge(cert_der.len()));
    }

    let (rest, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| CertError::ParseError(format!("{:?}", e)))?;
    if !rest.is_empty() {
        return Err(CertError::TrailingData(rest.len()));
    }

    let subject = cert
        .subject()
        .to_string_with_registry(oid_registry())
        .map_err(|e| CertError::UnreadableSubject(e.to_string()))?;
    if subject.is_empty() {
        return Err(CertError::EmptySubject);
    }
    Ok(TrustedIdentity::new(subject))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self_signed_der, self_signed_der_with};
    use rcgen::DnType;

    #[test]
    fn test_oversized_input_rejected() {
        let result = identity_from_der(&vec![0u8; MAX_CERT_SIZE + 1]);
        assert_eq!(result, Err(CertError::TooLarge(MAX_CERT_SIZE + 1)));
    }

    #[test]
    fn test_garbage_rejected() {
        let result = identity_from_der(b"not a certificate");
        assert!(matches!(result, Err(CertError::ParseError(_))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut der = self_signed_der("node-a");
        der.extend_from_slice(b"extra");
        assert_eq!(identity_from_der(&der), Err(CertError::TrailingData(5)));
    }

    #[test]
    fn test_empty_subject_identifies_nobody() {
        let der = self_signed_der_with(&[]);
        assert_eq!(identity_from_der(&der), Err(CertError::EmptySubject));
    }

    #[test]
    fn test_subject_becomes_identity() {
        let der = self_signed_der("node-a");
        let identity = identity_from_der(&der).unwrap();
        assert_eq!(identity.as_str(), "CN=node-a");
    }

    #[test]
    fn test_multi_rdn_subject_in_certificate_order() {
        let der = self_signed_der_with(&[
            (DnType::CommonName, "node-a"),
            (DnType::OrganizationName, "Example"),
            (DnType::CountryName, "US"),
        ]);
        let identity = identity_from_der(&der).unwrap();
        assert_eq!(identity.as_str(), "CN=node-a, O=Example, C=US");

        // Same CN under another organization is a different sender.
        let other_org = identity_from_der(&self_signed_der_with(&[
            (DnType::CommonName, "node-a"),
            (DnType::OrganizationName, "Elsewhere"),
            (DnType::CountryName, "US"),
        ]))
        .unwrap();
        assert_ne!(identity, other_org);
        assert_ne!(identity, identity_from_der(&self_signed_der("node-a")).unwrap());
    }

    #[test]
    fn test_same_subject_same_identity() {
        // Distinct keys, same subject: identities compare equal.
        let first = identity_from_der(&self_signed_der("coordinator")).unwrap();
        let second = identity_from_der(&self_signed_der("coordinator")).unwrap();
        let other = identity_from_der(&self_signed_der("instance")).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, other);
    }
}
