// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Certificate handles: a DER-encoded certificate, its parsed metadata, and
//! optionally the private key it was bundled with.

use crate::error::{Error, Result};
use crate::x509::{self, CertMeta};
use p12_keystore::{Certificate as P12Certificate, KeyStore, KeyStoreEntry, PrivateKeyChain};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A certificate held by the store.
///
/// Always carries the DER encoding and the metadata the store matches on.
/// When the certificate was loaded from (or is destined for) a PKCS#12
/// bundle, it additionally carries the PKCS#8 DER of its private key.
#[derive(Clone)]
pub struct StoredCertificate {
    der: Vec<u8>,
    meta: CertMeta,
    key_der: Option<Vec<u8>>,
}

impl StoredCertificate {
    /// Parse a DER-encoded public certificate.
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let meta = x509::parse_cert_der(&der)?;
        Ok(Self {
            der,
            meta,
            key_der: None,
        })
    }

    /// Read and parse a DER-encoded certificate file.
    pub fn from_der_file(path: &std::path::Path) -> Result<Self> {
        let der = std::fs::read(path).map_err(|e| Error::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_der(der)
    }

    /// Attach a PKCS#8 DER private key to a DER-encoded certificate.
    ///
    /// No check is made that the key matches the certificate; the store's
    /// key self-test is where usability is decided.
    pub fn with_private_key(der: Vec<u8>, key_der: Vec<u8>) -> Result<Self> {
        let mut cert = Self::from_der(der)?;
        cert.key_der = Some(key_der);
        Ok(cert)
    }

    /// Load the first certificate of a PKCS#12 bundle.
    ///
    /// If the bundle holds a private-key chain, the returned certificate is
    /// the chain's leaf and carries the key. A bundle that only holds loose
    /// certificates yields the first of them, without a key.
    pub fn from_pkcs12(bytes: &[u8], password: &str) -> Result<Self> {
        let keystore = KeyStore::from_pkcs12(bytes, password)
            .map_err(|e| Error::Pkcs12(format!("Failed to open bundle: {}", e)))?;

        let mut loose_cert: Option<&P12Certificate> = None;
        for (_alias, entry) in keystore.entries() {
            match entry {
                KeyStoreEntry::PrivateKeyChain(chain) => {
                    let leaf = chain.chain().first().ok_or_else(|| {
                        Error::Pkcs12("Bundle key chain contains no certificate".into())
                    })?;
                    return Self::with_private_key(leaf.as_der().to_vec(), chain.key().to_vec());
                }
                KeyStoreEntry::Certificate(cert) => {
                    loose_cert.get_or_insert(cert);
                }
                _ => {}
            }
        }

        match loose_cert {
            Some(cert) => Self::from_der(cert.as_der().to_vec()),
            None => Err(Error::Pkcs12("Bundle contains no certificate".into())),
        }
    }

    /// Serialize this certificate and its private key as a password-protected
    /// PKCS#12 bundle.
    ///
    /// # Errors
    /// Fails if the certificate carries no private key.
    pub fn to_pkcs12(&self, password: &str) -> Result<Vec<u8>> {
        let key_der = self
            .key_der
            .as_deref()
            .ok_or_else(|| Error::Pkcs12("Certificate has no private key to bundle".into()))?;

        let cert = P12Certificate::from_der(&self.der)
            .map_err(|e| Error::Pkcs12(format!("Failed to re-encode certificate: {}", e)))?;

        let mut keystore = KeyStore::new();
        let key_chain = PrivateKeyChain::new(key_der, [], vec![cert]);
        keystore.add_entry("trustdir", KeyStoreEntry::PrivateKeyChain(key_chain));

        keystore
            .writer(password)
            .write()
            .map_err(|e| Error::Pkcs12(format!("Failed to create bundle: {}", e)))
    }

    /// The DER encoding of the certificate.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// SHA-256 fingerprint over the DER encoding, uppercase hex.
    pub fn fingerprint(&self) -> &str {
        &self.meta.fingerprint
    }

    /// Subject distinguished name.
    pub fn subject(&self) -> &str {
        &self.meta.subject
    }

    /// Issuer distinguished name.
    pub fn issuer_dn(&self) -> &str {
        &self.meta.issuer
    }

    /// Subject common name, if the subject carries one.
    pub fn common_name(&self) -> Option<&str> {
        self.meta.common_name.as_deref()
    }

    /// Raw serial number bytes.
    pub fn raw_serial(&self) -> &[u8] {
        &self.meta.serial
    }

    pub fn has_private_key(&self) -> bool {
        self.key_der.is_some()
    }

    /// PKCS#8 DER of the private key, when present.
    pub fn private_key_der(&self) -> Option<&[u8]> {
        self.key_der.as_deref()
    }

    pub fn not_before_timestamp(&self) -> i64 {
        self.meta.not_before_timestamp
    }

    pub fn not_after_timestamp(&self) -> i64 {
        self.meta.not_after_timestamp
    }

    pub fn is_expired(&self) -> bool {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        self.meta.not_after_timestamp < now
    }
}

/// Two handles are equal when they encode the same certificate, regardless
/// of whether either carries key material.
impl PartialEq for StoredCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for StoredCertificate {}

// Hand-written so key bytes never end up in debug output.
impl fmt::Debug for StoredCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCertificate")
            .field("fingerprint", &self.meta.fingerprint)
            .field("subject", &self.meta.subject)
            .field("has_private_key", &self.key_der.is_some())
            .finish()
    }
}

/// A bundle passphrase that is securely wiped from memory on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct Passphrase(String);

impl Passphrase {
    /// Wrap a caller-supplied passphrase; absent means the empty default.
    pub(crate) fn new(password: Option<&str>) -> Self {
        Self(password.unwrap_or_default().to_string())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestCa;

    #[test]
    fn test_from_der_extracts_metadata() {
        let ca = TestCa::new("Cert CA");
        let (der, _) = ca.issue("entry.example", &[0x10]);

        let cert = StoredCertificate::from_der(der.clone()).unwrap();

        assert_eq!(cert.der(), der.as_slice());
        assert_eq!(cert.common_name(), Some("entry.example"));
        assert!(!cert.has_private_key());
        assert!(!cert.is_expired());
    }

    #[test]
    fn test_pkcs12_round_trip_preserves_der_and_key() {
        let ca = TestCa::new("Bundle CA");
        let (der, key_der) = ca.issue("bundle.example", &[0x11]);
        let cert = StoredCertificate::with_private_key(der.clone(), key_der.clone()).unwrap();

        let bundle = cert.to_pkcs12("hunter2").unwrap();
        let loaded = StoredCertificate::from_pkcs12(&bundle, "hunter2").unwrap();

        assert_eq!(loaded.der(), der.as_slice());
        assert_eq!(loaded.private_key_der(), Some(key_der.as_slice()));
        assert_eq!(loaded, cert);
    }

    #[test]
    fn test_pkcs12_wrong_password_fails() {
        let ca = TestCa::new("Bundle CA");
        let (der, key_der) = ca.issue("bundle.example", &[0x12]);
        let cert = StoredCertificate::with_private_key(der, key_der).unwrap();

        let bundle = cert.to_pkcs12("correct").unwrap();
        assert!(StoredCertificate::from_pkcs12(&bundle, "wrong").is_err());
    }

    #[test]
    fn test_to_pkcs12_requires_key() {
        let ca = TestCa::new("Bundle CA");
        let (der, _) = ca.issue("nokey.example", &[0x13]);
        let cert = StoredCertificate::from_der(der).unwrap();

        assert!(cert.to_pkcs12("pw").is_err());
    }

    #[test]
    fn test_debug_hides_key_material() {
        let ca = TestCa::new("Debug CA");
        let (der, key_der) = ca.issue("debug.example", &[0x14]);
        let cert = StoredCertificate::with_private_key(der, key_der).unwrap();

        let rendered = format!("{:?}", cert);
        assert!(rendered.contains("has_private_key: true"));
        assert!(!rendered.contains("key_der"));
    }
}
