// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! In-memory index over the store's certificate directories.
//!
//! The index maps fingerprints to [`Entry`] values rebuilt from directory
//! contents. Scans are best-effort: a file that fails to read or parse is
//! logged and skipped, never aborting the scan. A scan that stops early
//! because it found its target is recorded as non-authoritative, forcing the
//! next scan to be full.

use crate::cert::StoredCertificate;
use crate::config::{StoreOptions, StorePaths};
use crate::error::{Error, Result};
use crate::fs::FileAccess;
use crate::naming;
use crate::x509;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{debug, warn};

/// One known certificate and the files backing it.
#[derive(Debug, Clone)]
pub struct Entry {
    pub fingerprint: String,
    pub public_cert: StoredCertificate,
    pub public_cert_path: PathBuf,
    /// Bundle (`.pfx`) or presence-only marker (`.pem`) path, when either
    /// exists under the expected base name.
    pub private_key_path: Option<PathBuf>,
    /// The bundle's key-bearing certificate, when the bundle loaded and
    /// actually carried a private key.
    pub cert_with_key: Option<StoredCertificate>,
}

impl Entry {
    /// The certificate this entry resolves to: the key-bearing one when
    /// available, else the public one.
    pub fn certificate(&self) -> &StoredCertificate {
        self.cert_with_key.as_ref().unwrap_or(&self.public_cert)
    }
}

#[derive(Default)]
pub(crate) struct DirectoryIndex {
    entries: HashMap<String, Entry>,
    /// Time of the last authoritative (full) scan. `None` means never
    /// scanned, or the last scan was partial and must not be trusted.
    last_scan: Option<SystemTime>,
}

impl DirectoryIndex {
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.last_scan = None;
    }

    /// Force the next refresh to rescan regardless of directory timestamps.
    pub(crate) fn invalidate(&mut self) {
        self.last_scan = None;
    }

    pub(crate) fn entries(&self) -> &HashMap<String, Entry> {
        &self.entries
    }

    pub(crate) fn get(&self, fingerprint: &str) -> Option<&Entry> {
        self.entries.get(&fingerprint.to_ascii_uppercase())
    }

    /// Bring the index up to date with the directories.
    ///
    /// With `target` set, the scan stops as soon as the matching fingerprint
    /// has been indexed; the resulting view is partial, so the scan
    /// timestamp is reset and the next refresh rescans from scratch.
    pub(crate) fn refresh(
        &mut self,
        paths: &StorePaths,
        options: &StoreOptions,
        fs: &dyn FileAccess,
        target: Option<&str>,
    ) -> Result<()> {
        if !fs.exists(&paths.certs_dir) {
            self.clear();
            return Ok(());
        }

        if let Some(last) = self.last_scan {
            if !self.dirs_modified_since(paths, options, fs, last) {
                debug!("certificate index cache is current, skipping rescan");
                return Ok(());
            }
        }

        self.entries.clear();
        self.last_scan = Some(SystemTime::now());

        let files = fs
            .read_dir(&paths.certs_dir)
            .map_err(|e| Error::ReadDir {
                path: paths.certs_dir.clone(),
                source: e,
            })?;

        for path in files {
            if path.extension().and_then(|e| e.to_str()) != Some(naming::CERT_EXT) {
                continue;
            }

            let der = match fs.read(&path) {
                Ok(bytes) => bytes,
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

            let fingerprint = cert.fingerprint().to_string();
            let (private_key_path, cert_with_key) = if options.private_keys {
                locate_private_key(paths, fs, &cert)
            } else {
                (None, None)
            };

            let found_target = target
                .map(|t| x509::fingerprint_matches(t, &fingerprint))
                .unwrap_or(false);

            self.entries.insert(
                fingerprint.clone(),
                Entry {
                    fingerprint,
                    public_cert: cert,
                    public_cert_path: path,
                    private_key_path,
                    cert_with_key,
                },
            );

            if found_target {
                // The scan is incomplete: nothing can be concluded about
                // files we never visited. Force the next scan to be full.
                self.last_scan = None;
                break;
            }
        }

        Ok(())
    }

    /// Whether any relevant subdirectory changed after `last`.
    fn dirs_modified_since(
        &self,
        paths: &StorePaths,
        options: &StoreOptions,
        fs: &dyn FileAccess,
        last: SystemTime,
    ) -> bool {
        let certs_changed = fs
            .modified(&paths.certs_dir)
            .map(|m| m >= last)
            .unwrap_or(true);
        if certs_changed {
            return true;
        }
        if options.private_keys && fs.exists(&paths.private_dir) {
            return fs
                .modified(&paths.private_dir)
                .map(|m| m >= last)
                .unwrap_or(true);
        }
        false
    }
}

/// Find the private-key counterpart of a certificate by base-name match.
///
/// A bundle that exists but cannot be opened with the default passphrase
/// (or that carries no key) downgrades the entry to public-only; the
/// bundle path is still recorded since the file is there.
fn locate_private_key(
    paths: &StorePaths,
    fs: &dyn FileAccess,
    cert: &StoredCertificate,
) -> (Option<PathBuf>, Option<StoredCertificate>) {
    let base = naming::file_base_name(cert);

    let bundle_path = paths
        .private_dir
        .join(format!("{}.{}", base, naming::BUNDLE_EXT));
    if fs.exists(&bundle_path) {
        let cert_with_key = match fs.read(&bundle_path) {
            Ok(bytes) => match StoredCertificate::from_pkcs12(&bytes, "") {
                Ok(loaded) if loaded.has_private_key() => Some(loaded),
                Ok(_) => {
                    warn!("bundle {} carries no private key", bundle_path.display());
                    None
                }
                Err(e) => {
                    warn!("could not load bundle {}: {}", bundle_path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("could not read bundle {}: {}", bundle_path.display(), e);
                None
            }
        };
        return (Some(bundle_path), cert_with_key);
    }

    let marker_path = paths
        .private_dir
        .join(format!("{}.{}", base, naming::KEY_MARKER_EXT));
    if fs.exists(&marker_path) {
        // Presence-only marker: recorded, never parsed.
        return (Some(marker_path), None);
    }

    (None, None)
}
