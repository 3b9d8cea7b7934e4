// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Private-key resolution.
//!
//! Locates the private-key counterpart of a public certificate by scanning
//! the certificate files directly, independent of the cached index. The scan
//! tolerates a concurrently modified directory: every candidate failure is
//! logged and treated as "no match for this file".

use crate::cert::{Passphrase, StoredCertificate};
use crate::error::{Error, Result};
use crate::naming;
use crate::store::CertStore;
use crate::x509;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use tracing::warn;

/// Filters for [`CertStore::load_private_key`]. At least one of
/// `fingerprint` and `subject` must be set.
///
/// A `subject` containing `=` is matched as a full distinguished name; a
/// bare name is matched against the `CN=` component. `password` defaults to
/// the empty passphrase.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyQuery<'a> {
    pub fingerprint: Option<&'a str>,
    pub subject: Option<&'a str>,
    pub password: Option<&'a str>,
}

impl CertStore {
    /// Find a certificate matching the query and load its private-key
    /// bundle.
    ///
    /// Returns the key-bearing certificate of the first candidate whose
    /// bundle loads with the supplied password and whose key passes the
    /// usability self-test, or `None` when the directory is exhausted.
    ///
    /// Reads run without the store lock; the directory may change
    /// underneath the scan and each file is handled best-effort.
    ///
    /// # Errors
    /// Fails if neither filter is given, or if the certificates directory
    /// does not exist.
    pub fn load_private_key(&self, query: &KeyQuery<'_>) -> Result<Option<StoredCertificate>> {
        if query.fingerprint.is_none() && query.subject.is_none() {
            return Err(Error::MissingKeyQuery);
        }

        let (paths, _options) = self.paths_snapshot()?;
        let fs = self.file_access();

        if !fs.exists(&paths.certs_dir) {
            return Err(Error::DirectoryNotFound(paths.certs_dir.clone()));
        }
        let files = fs.read_dir(&paths.certs_dir).map_err(|e| Error::ReadDir {
            path: paths.certs_dir.clone(),
            source: e,
        })?;

        let passphrase = Passphrase::new(query.password);
        for path in files {
            if path.extension().and_then(|e| e.to_str()) != Some(naming::CERT_EXT) {
                continue;
            }

            let der = match fs.read(&path) {
                Ok(der) => der,
                Err(e) => {
                    warn!("skipping unreadable certificate {}: {}", path.display(), e);
                    continue;
                }
            };
            let cert = match StoredCertificate::from_der(der) {
                Ok(cert) => cert,
                Err(e) => {
                    warn!("skipping malformed certificate {}: {}", path.display(), e);
                    continue;
                }
            };

            if let Some(filter) = query.fingerprint {
                if !x509::fingerprint_matches(filter, cert.fingerprint()) {
                    continue;
                }
            }
            if let Some(filter) = query.subject {
                if !x509::subject_matches(cert.subject(), filter) {
                    continue;
                }
            }

            let bundle_path = paths.private_dir.join(format!(
                "{}.{}",
                naming::file_base_name(&cert),
                naming::BUNDLE_EXT
            ));
            let bytes = match fs.read(&bundle_path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("no usable bundle at {}: {}", bundle_path.display(), e);
                    continue;
                }
            };
            let loaded = match StoredCertificate::from_pkcs12(&bytes, passphrase.as_str()) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!("could not open bundle {}: {}", bundle_path.display(), e);
                    continue;
                }
            };
            if !loaded.has_private_key() {
                warn!("bundle {} carries no private key", bundle_path.display());
                continue;
            }
            if let Some(key_der) = loaded.private_key_der() {
                if !key_is_usable(key_der) {
                    warn!(
                        "key in {} failed the usability self-test",
                        bundle_path.display()
                    );
                    continue;
                }
            }

            return Ok(Some(loaded));
        }

        Ok(None)
    }
}

/// Whether a PKCS#8 key is usable for returning to a caller.
///
/// RSA keys must survive an encrypt-then-decrypt round trip on a zero-filled
/// block sized to the modulus minus the PKCS#1 v1.5 padding overhead. Other
/// key types have no self-test defined and pass by default.
fn key_is_usable(key_der: &[u8]) -> bool {
    let Ok(private) = RsaPrivateKey::from_pkcs8_der(key_der) else {
        return true;
    };
    rsa_round_trip(&private)
}

fn rsa_round_trip(private: &RsaPrivateKey) -> bool {
    let public = RsaPublicKey::from(private);
    // PKCS#1 v1.5 padding costs 11 bytes of the modulus.
    let block = vec![0u8; private.size().saturating_sub(11)];
    let Ok(ciphertext) = public.encrypt(&mut rand_core::OsRng, Pkcs1v15Encrypt, &block) else {
        return false;
    };
    match private.decrypt(Pkcs1v15Encrypt, &ciphertext) {
        Ok(plain) => plain == block,
        Err(_) => false,
    }
}
