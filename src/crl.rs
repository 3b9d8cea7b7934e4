// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Certificate revocation lists: enumeration, verification, and the
//! revocation-check algorithm.
//!
//! CRLs are never cached. Every operation re-reads the CRL directory so a
//! list dropped in (or removed) by another process is honored on the next
//! check. Reads run without the store lock and tolerate concurrent
//! modification the same way the index scan does.

use crate::cert::StoredCertificate;
use crate::error::{Error, Result};
use crate::fs;
use crate::naming;
use crate::store::CertStore;
use std::collections::HashSet;
use ::time::OffsetDateTime;
use tracing::warn;
use x509_parser::prelude::*;

/// Outcome of a revocation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStatus {
    /// At least one fresh, issuer-verified CRL was examined and none listed
    /// the certificate.
    Good,
    /// An issuer-verified CRL lists the certificate's serial.
    Revoked,
    /// No issuer-verified CRL was available, or none was currently fresh.
    Unknown,
}

/// A parsed revocation list plus the raw bytes it came from.
#[derive(Debug, Clone)]
pub struct Crl {
    raw: Vec<u8>,
    issuer: String,
    this_update: OffsetDateTime,
    next_update: Option<OffsetDateTime>,
    revoked_serials: HashSet<Vec<u8>>,
}

impl Crl {
    /// Parse a DER-encoded CRL.
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self> {
        let (issuer, this_update, next_update, revoked_serials) = {
            let (rest, crl) = CertificateRevocationList::from_der(&raw)
                .map_err(|e| Error::CrlParse(format!("Invalid CRL: {}", e)))?;
            if !rest.is_empty() {
                return Err(Error::CrlParse(format!(
                    "{} trailing bytes after CRL",
                    rest.len()
                )));
            }
            (
                crl.issuer().to_string(),
                crl.last_update().to_datetime(),
                crl.next_update().map(|t| t.to_datetime()),
                crl.iter_revoked_certificates()
                    .map(|revoked| revoked.raw_serial().to_vec())
                    .collect(),
            )
        };
        Ok(Self {
            raw,
            issuer,
            this_update,
            next_update,
            revoked_serials,
        })
    }

    /// The raw bytes this CRL was parsed from.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Issuer distinguished name.
    pub fn issuer_dn(&self) -> &str {
        &self.issuer
    }

    pub fn this_update(&self) -> OffsetDateTime {
        self.this_update
    }

    /// Absent means the CRL declares no expiry.
    pub fn next_update(&self) -> Option<OffsetDateTime> {
        self.next_update
    }

    /// Whether the CRL is within its validity window at `now`.
    pub fn is_current(&self, now: OffsetDateTime) -> bool {
        self.this_update <= now && self.next_update.map_or(true, |next| next >= now)
    }

    /// Whether the CRL lists `serial` as revoked.
    pub fn lists_serial(&self, serial: &[u8]) -> bool {
        self.revoked_serials.contains(serial)
    }

    /// Verify the CRL's signature against the issuer's public key.
    pub fn verify_signature(&self, issuer: &StoredCertificate) -> bool {
        let Ok((_, issuer_cert)) = X509Certificate::from_der(issuer.der()) else {
            return false;
        };
        let Ok((_, crl)) = CertificateRevocationList::from_der(&self.raw) else {
            return false;
        };
        crl.verify_signature(issuer_cert.public_key()).is_ok()
    }
}

/// Revocation-list operations over a store. Obtained via
/// [`CertStore::crls`].
pub struct CrlManager<'a> {
    store: &'a CertStore,
}

impl<'a> CrlManager<'a> {
    pub(crate) fn new(store: &'a CertStore) -> Self {
        Self { store }
    }

    /// All parseable CRLs in the store.
    ///
    /// With an `issuer` filter, only CRLs whose issuer DN matches the
    /// certificate's subject, whose signature verifies against its public
    /// key, and which are currently within validity are kept.
    pub fn enumerate(&self, issuer: Option<&StoredCertificate>) -> Result<Vec<Crl>> {
        let now = OffsetDateTime::now_utc();
        let mut crls = Vec::new();
        for crl in self.read_all()? {
            if let Some(issuer) = issuer {
                if crl.issuer_dn() != issuer.subject()
                    || !crl.verify_signature(issuer)
                    || !crl.is_current(now)
                {
                    continue;
                }
            }
            crls.push(crl);
        }
        Ok(crls)
    }

    /// Check a certificate against every CRL its issuer has published.
    ///
    /// All issuer-matched, signature-verified CRLs are consulted regardless
    /// of freshness — a revocation listed in a stale CRL still counts. The
    /// first listing wins. A `Good` verdict additionally requires that at
    /// least one of the examined CRLs was currently fresh; otherwise the
    /// status is `Unknown`.
    pub fn is_revoked(
        &self,
        issuer: &StoredCertificate,
        certificate: &StoredCertificate,
    ) -> Result<RevocationStatus> {
        let (paths, _) = self.store.paths_snapshot()?;
        if !self.store.file_access().exists(&paths.crl_dir) {
            return Ok(RevocationStatus::Unknown);
        }

        let now = OffsetDateTime::now_utc();
        let mut any_fresh = false;
        for crl in self.read_all()? {
            if crl.issuer_dn() != issuer.subject() || !crl.verify_signature(issuer) {
                continue;
            }
            if crl.lists_serial(certificate.raw_serial()) {
                return Ok(RevocationStatus::Revoked);
            }
            if crl.is_current(now) {
                any_fresh = true;
            }
        }

        Ok(if any_fresh {
            RevocationStatus::Good
        } else {
            RevocationStatus::Unknown
        })
    }

    /// Add a CRL to the store.
    ///
    /// The issuing certificate must already be in the store: its subject
    /// must match the CRL's issuer DN and its public key must verify the
    /// CRL's signature.
    ///
    /// # Errors
    /// Fails with [`Error::CrlIssuerNotFound`] when no stored certificate
    /// qualifies.
    pub fn add(&self, crl: &Crl) -> Result<()> {
        let issuer = self
            .store
            .enumerate()?
            .into_iter()
            .find(|cert| cert.subject() == crl.issuer_dn() && crl.verify_signature(cert))
            .ok_or_else(|| Error::CrlIssuerNotFound(crl.issuer_dn().to_string()))?;

        let (paths, _) = self.store.paths_snapshot()?;
        std::fs::create_dir_all(&paths.crl_dir).map_err(|e| Error::CreateDir {
            path: paths.crl_dir.clone(),
            source: e,
        })?;
        let path = paths.crl_dir.join(format!(
            "{}.{}",
            naming::file_base_name(&issuer),
            naming::CRL_EXT
        ));
        fs::atomic_write(&path, crl.raw())
    }

    /// Delete a CRL by exact byte-content match.
    ///
    /// Every file in the CRL directory is considered; a candidate matches
    /// when its length and then its full contents equal the CRL's raw
    /// bytes. Returns whether a file was deleted.
    pub fn delete(&self, crl: &Crl) -> Result<bool> {
        let (paths, _) = self.store.paths_snapshot()?;
        let fs_access = self.store.file_access();
        if !fs_access.exists(&paths.crl_dir) {
            return Ok(false);
        }

        let files = fs_access.read_dir(&paths.crl_dir).map_err(|e| Error::ReadDir {
            path: paths.crl_dir.clone(),
            source: e,
        })?;
        for path in files {
            let same_length = std::fs::metadata(&path)
                .map(|m| m.len() == crl.raw().len() as u64)
                .unwrap_or(false);
            if !same_length {
                continue;
            }
            let matches = match fs_access.read(&path) {
                Ok(bytes) => bytes == crl.raw(),
                Err(e) => {
                    warn!("skipping unreadable CRL {}: {}", path.display(), e);
                    false
                }
            };
            if matches {
                std::fs::remove_file(&path).map_err(|e| Error::Remove {
                    path: path.clone(),
                    source: e,
                })?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Read and parse every `.crl` file, skipping failures.
    fn read_all(&self) -> Result<Vec<Crl>> {
        let (paths, _) = self.store.paths_snapshot()?;
        let fs_access = self.store.file_access();
        if !fs_access.exists(&paths.crl_dir) {
            return Ok(Vec::new());
        }

        let files = fs_access.read_dir(&paths.crl_dir).map_err(|e| Error::ReadDir {
            path: paths.crl_dir.clone(),
            source: e,
        })?;
        let mut crls = Vec::new();
        for path in files {
            if path.extension().and_then(|e| e.to_str()) != Some(naming::CRL_EXT) {
                continue;
            }
            let bytes = match fs_access.read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("skipping unreadable CRL {}: {}", path.display(), e);
                    continue;
                }
            };
            match Crl::from_bytes(bytes) {
                Ok(crl) => crls.push(crl),
                Err(e) => warn!("skipping malformed CRL {}: {}", path.display(), e),
            }
        }
        Ok(crls)
    }
}
