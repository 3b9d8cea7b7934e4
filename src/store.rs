// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! The certificate store: open/close, enumeration, add/delete/find, and the
//! access-rule pass-throughs.
//!
//! One mutex guards all store state (the fixed paths, the directory index,
//! and its scan timestamp). Every operation here holds it for its full
//! duration and may block on filesystem I/O while doing so. The private-key
//! resolver and the CRL manager deliberately read outside that lock; see
//! `keys` and `crl`.

use crate::access::{AccessRuleProvider, AccessRules, FilePermissionRules};
use crate::cert::{Passphrase, StoredCertificate};
use crate::config::{StoreOptions, StorePaths};
use crate::crl::CrlManager;
use crate::error::{Error, Result};
use crate::fs::{self, FileAccess, StdFileAccess};
use crate::index::DirectoryIndex;
use crate::naming;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

struct StoreState {
    paths: Option<StorePaths>,
    options: StoreOptions,
    index: DirectoryIndex,
}

/// A file-system-backed store of certificates, private-key bundles, and
/// revocation lists.
pub struct CertStore {
    state: Mutex<StoreState>,
    fs: Arc<dyn FileAccess>,
    access: Arc<dyn AccessRuleProvider>,
}

impl CertStore {
    /// A store with the default filesystem and permission providers.
    pub fn new() -> Self {
        Self::with_providers(Arc::new(StdFileAccess), Arc::new(FilePermissionRules))
    }

    /// A store reading through `fs` and applying rules through `access`.
    pub fn with_providers(fs: Arc<dyn FileAccess>, access: Arc<dyn AccessRuleProvider>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                paths: None,
                options: StoreOptions::default(),
                index: DirectoryIndex::default(),
            }),
            fs,
            access,
        }
    }

    /// Open the store at `root`, fixing the three subdirectory paths.
    ///
    /// None of the directories need to exist yet; entries are populated
    /// lazily by the first operation that needs them.
    pub fn open(&self, root: impl AsRef<Path>) {
        self.open_with_options(root, StoreOptions::default());
    }

    pub fn open_with_options(&self, root: impl AsRef<Path>, options: StoreOptions) {
        let mut state = self.state();
        state.paths = Some(StorePaths::new(root));
        state.options = options;
        state.index.clear();
    }

    /// Close the store, dropping all paths and cached index state. A
    /// subsequent open starts cold.
    pub fn close(&self) {
        let mut state = self.state();
        state.paths = None;
        state.index.clear();
    }

    /// All certificates currently in the store, one per fingerprint: the
    /// key-bearing certificate when a usable bundle exists, else the public
    /// one. Sorted by fingerprint.
    pub fn enumerate(&self) -> Result<Vec<StoredCertificate>> {
        let mut state = self.state();
        let (paths, options) = Self::open_paths(&state)?;
        state.index.refresh(&paths, &options, self.fs.as_ref(), None)?;

        let mut certs: Vec<StoredCertificate> = state
            .index
            .entries()
            .values()
            .map(|entry| entry.certificate().clone())
            .collect();
        certs.sort_by(|a, b| a.fingerprint().cmp(b.fingerprint()));
        Ok(certs)
    }

    /// Add a certificate to the store.
    ///
    /// The DER-encoded public certificate is always written. When the
    /// certificate carries a private key, a password-protected PKCS#12
    /// bundle is additionally written to the private-keys directory (an
    /// absent passphrase means the empty default).
    ///
    /// # Errors
    /// Fails with [`Error::DuplicateFingerprint`] if an entry with the same
    /// fingerprint already exists.
    pub fn add(&self, cert: &StoredCertificate, passphrase: Option<&str>) -> Result<()> {
        let mut state = self.state();
        let (paths, options) = Self::open_paths(&state)?;
        state
            .index
            .refresh(&paths, &options, self.fs.as_ref(), Some(cert.fingerprint()))?;
        if state.index.get(cert.fingerprint()).is_some() {
            return Err(Error::DuplicateFingerprint(cert.fingerprint().to_string()));
        }

        let base = naming::file_base_name(cert);

        std::fs::create_dir_all(&paths.certs_dir).map_err(|e| Error::CreateDir {
            path: paths.certs_dir.clone(),
            source: e,
        })?;
        let cert_path = paths
            .certs_dir
            .join(format!("{}.{}", base, naming::CERT_EXT));
        fs::atomic_write(&cert_path, cert.der())?;

        if cert.has_private_key() {
            std::fs::create_dir_all(&paths.private_dir).map_err(|e| Error::CreateDir {
                path: paths.private_dir.clone(),
                source: e,
            })?;
            let passphrase = Passphrase::new(passphrase);
            let bundle = cert.to_pkcs12(passphrase.as_str())?;
            let bundle_path = paths
                .private_dir
                .join(format!("{}.{}", base, naming::BUNDLE_EXT));
            fs::atomic_write_secret(&bundle_path, &bundle)?;
        }

        state.index.invalidate();
        Ok(())
    }

    /// Delete a certificate and its private-key file, if either exists.
    /// Returns whether anything was deleted.
    pub fn delete(&self, fingerprint: &str) -> Result<bool> {
        let mut state = self.state();
        let (paths, options) = Self::open_paths(&state)?;
        state
            .index
            .refresh(&paths, &options, self.fs.as_ref(), Some(fingerprint))?;

        let (cert_path, key_path) = match state.index.get(fingerprint) {
            Some(entry) => (
                entry.public_cert_path.clone(),
                entry.private_key_path.clone(),
            ),
            None => return Ok(false),
        };

        let mut deleted = false;
        if let Some(key_path) = key_path {
            match std::fs::remove_file(&key_path) {
                Ok(()) => deleted = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::Remove {
                        path: key_path,
                        source: e,
                    });
                }
            }
        }
        match std::fs::remove_file(&cert_path) {
            Ok(()) => deleted = true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::Remove {
                    path: cert_path,
                    source: e,
                });
            }
        }

        if deleted {
            state.index.invalidate();
        }
        Ok(deleted)
    }

    /// Look up a certificate by fingerprint (case-insensitive). Uses a
    /// targeted scan that may stop early once the fingerprint is found.
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<StoredCertificate>> {
        let mut state = self.state();
        let (paths, options) = Self::open_paths(&state)?;
        state
            .index
            .refresh(&paths, &options, self.fs.as_ref(), Some(fingerprint))?;
        Ok(state
            .index
            .get(fingerprint)
            .map(|entry| entry.certificate().clone()))
    }

    /// Path of the entry's public-certificate file, if the entry and the
    /// file both exist.
    pub fn public_key_file_path(&self, fingerprint: &str) -> Result<Option<PathBuf>> {
        let mut state = self.state();
        let (paths, options) = Self::open_paths(&state)?;
        state
            .index
            .refresh(&paths, &options, self.fs.as_ref(), Some(fingerprint))?;
        Ok(state.index.get(fingerprint).and_then(|entry| {
            self.fs
                .exists(&entry.public_cert_path)
                .then(|| entry.public_cert_path.clone())
        }))
    }

    /// Path of the entry's private-key file (bundle or marker), if the
    /// entry and the file both exist.
    pub fn private_key_file_path(&self, fingerprint: &str) -> Result<Option<PathBuf>> {
        let mut state = self.state();
        let (paths, options) = Self::open_paths(&state)?;
        state
            .index
            .refresh(&paths, &options, self.fs.as_ref(), Some(fingerprint))?;
        Ok(state.index.get(fingerprint).and_then(|entry| {
            entry
                .private_key_path
                .as_ref()
                .filter(|path| self.fs.exists(path))
                .cloned()
        }))
    }

    /// Access rules currently applied to the certificates directory.
    ///
    /// # Errors
    /// Fails with [`Error::EntryNotFound`] if no entry matches.
    pub fn get_access_rules(&self, fingerprint: &str) -> Result<AccessRules> {
        let mut state = self.state();
        let (paths, options) = Self::open_paths(&state)?;
        state
            .index
            .refresh(&paths, &options, self.fs.as_ref(), Some(fingerprint))?;
        if state.index.get(fingerprint).is_none() {
            return Err(Error::EntryNotFound(fingerprint.to_string()));
        }
        self.access.get_rules(&paths.certs_dir)
    }

    /// Apply `rules` to the certificates directory and, unless it is the
    /// same path, the private-keys directory.
    pub fn set_access_rules(&self, fingerprint: &str, rules: &AccessRules) -> Result<()> {
        let mut state = self.state();
        let (paths, options) = Self::open_paths(&state)?;
        state
            .index
            .refresh(&paths, &options, self.fs.as_ref(), Some(fingerprint))?;
        if state.index.get(fingerprint).is_none() {
            return Err(Error::EntryNotFound(fingerprint.to_string()));
        }

        self.access.set_rules(&paths.certs_dir, rules)?;
        if !same_path_case_insensitive(&paths.certs_dir, &paths.private_dir)? {
            self.access.set_rules(&paths.private_dir, rules)?;
        }
        Ok(())
    }

    /// Access rules currently applied to the private-keys directory.
    ///
    /// # Errors
    /// Fails with [`Error::PrivateKeyNotFound`] if the entry has no
    /// private-key file on disk.
    pub fn get_key_access_rules(&self, fingerprint: &str) -> Result<AccessRules> {
        let mut state = self.state();
        let paths = self.require_key_file(&mut state, fingerprint)?;
        self.access.get_rules(&paths.private_dir)
    }

    /// Apply `rules` to the private-keys directory.
    pub fn set_key_access_rules(&self, fingerprint: &str, rules: &AccessRules) -> Result<()> {
        let mut state = self.state();
        let paths = self.require_key_file(&mut state, fingerprint)?;
        self.access.set_rules(&paths.private_dir, rules)
    }

    /// The revocation-list manager for this store.
    pub fn crls(&self) -> CrlManager<'_> {
        CrlManager::new(self)
    }

    /// Snapshot of the open paths and options, for operations that read the
    /// directories without holding the store lock.
    pub(crate) fn paths_snapshot(&self) -> Result<(StorePaths, StoreOptions)> {
        let state = self.state();
        Self::open_paths(&state)
    }

    pub(crate) fn file_access(&self) -> &dyn FileAccess {
        self.fs.as_ref()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        // A panic while holding the lock leaves no broken invariant the
        // next scan would not repair, so poisoning is recovered from.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn open_paths(state: &StoreState) -> Result<(StorePaths, StoreOptions)> {
        let paths = state.paths.clone().ok_or(Error::StoreNotOpen)?;
        Ok((paths, state.options.clone()))
    }

    fn require_key_file(
        &self,
        state: &mut MutexGuard<'_, StoreState>,
        fingerprint: &str,
    ) -> Result<StorePaths> {
        let (paths, options) = Self::open_paths(state)?;
        state
            .index
            .refresh(&paths, &options, self.fs.as_ref(), Some(fingerprint))?;
        let entry = state
            .index
            .get(fingerprint)
            .ok_or_else(|| Error::EntryNotFound(fingerprint.to_string()))?;
        let has_key_file = entry
            .private_key_path
            .as_ref()
            .is_some_and(|path| self.fs.exists(path));
        if !has_key_file {
            return Err(Error::PrivateKeyNotFound(fingerprint.to_string()));
        }
        Ok(paths)
    }
}

impl Default for CertStore {
    fn default() -> Self {
        Self::new()
    }
}

fn same_path_case_insensitive(a: &Path, b: &Path) -> Result<bool> {
    Ok(fs::path_to_str(a)?.eq_ignore_ascii_case(fs::path_to_str(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestCa;
    use tempfile::TempDir;

    fn open_store(root: &TempDir) -> CertStore {
        let store = CertStore::new();
        store.open(root.path());
        store
    }

    #[test]
    fn test_operations_require_open() {
        let store = CertStore::new();
        assert!(matches!(store.enumerate(), Err(Error::StoreNotOpen)));
        assert!(matches!(
            store.find_by_fingerprint("AB"),
            Err(Error::StoreNotOpen)
        ));
    }

    #[test]
    fn test_add_then_find_returns_equivalent_certificate() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);
        let ca = TestCa::new("Store CA");
        let (der, _) = ca.issue("added.example", &[0x20]);
        let cert = StoredCertificate::from_der(der).unwrap();

        store.add(&cert, None).unwrap();

        let found = store.find_by_fingerprint(cert.fingerprint()).unwrap();
        assert_eq!(found, Some(cert));
    }

    #[test]
    fn test_add_duplicate_fails_and_leaves_store_unchanged() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);
        let ca = TestCa::new("Store CA");
        let (der, _) = ca.issue("dup.example", &[0x21]);
        let cert = StoredCertificate::from_der(der).unwrap();

        store.add(&cert, None).unwrap();
        let err = store.add(&cert, None).unwrap_err();

        assert!(matches!(err, Error::DuplicateFingerprint(_)));
        assert_eq!(store.enumerate().unwrap().len(), 1);
    }

    #[test]
    fn test_add_with_key_writes_bundle_and_der() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);
        let ca = TestCa::new("Store CA");
        let (der, key_der) = ca.issue("pair.example", &[0x22]);
        let cert = StoredCertificate::with_private_key(der, key_der).unwrap();

        store.add(&cert, None).unwrap();

        let cert_path = store.public_key_file_path(cert.fingerprint()).unwrap();
        let key_path = store.private_key_file_path(cert.fingerprint()).unwrap();
        assert!(cert_path.is_some());
        assert!(key_path.unwrap().extension().unwrap() == "pfx");

        // Enumerate resolves to the key-bearing certificate.
        let listed = store.enumerate().unwrap();
        assert!(listed[0].has_private_key());
    }

    #[test]
    fn test_delete_removes_both_files() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);
        let ca = TestCa::new("Store CA");
        let (der, key_der) = ca.issue("gone.example", &[0x23]);
        let cert = StoredCertificate::with_private_key(der, key_der).unwrap();
        store.add(&cert, None).unwrap();
        let cert_path = store
            .public_key_file_path(cert.fingerprint())
            .unwrap()
            .unwrap();
        let key_path = store
            .private_key_file_path(cert.fingerprint())
            .unwrap()
            .unwrap();

        assert!(store.delete(cert.fingerprint()).unwrap());

        assert!(!cert_path.exists());
        assert!(!key_path.exists());
        assert_eq!(store.find_by_fingerprint(cert.fingerprint()).unwrap(), None);
    }

    #[test]
    fn test_delete_unknown_fingerprint_returns_false() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);
        assert!(!store.delete("0000").unwrap());
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);
        let ca = TestCa::new("Store CA");
        let (der, _) = ca.issue("case.example", &[0x24]);
        let cert = StoredCertificate::from_der(der).unwrap();
        store.add(&cert, None).unwrap();

        let lower = cert.fingerprint().to_lowercase();
        assert!(store.find_by_fingerprint(&lower).unwrap().is_some());
    }

    #[test]
    fn test_close_resets_state() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);
        let ca = TestCa::new("Store CA");
        let (der, _) = ca.issue("closed.example", &[0x25]);
        store
            .add(&StoredCertificate::from_der(der).unwrap(), None)
            .unwrap();

        store.close();

        assert!(matches!(store.enumerate(), Err(Error::StoreNotOpen)));
        // Reopening starts cold but sees the same files.
        store.open(root.path());
        assert_eq!(store.enumerate().unwrap().len(), 1);
    }

    #[test]
    fn test_access_rules_require_existing_entry() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);
        assert!(matches!(
            store.get_access_rules("0000"),
            Err(Error::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_key_access_rules_require_key_file() {
        let root = TempDir::new().unwrap();
        let store = open_store(&root);
        let ca = TestCa::new("Store CA");
        let (der, _) = ca.issue("keyless.example", &[0x26]);
        let cert = StoredCertificate::from_der(der).unwrap();
        store.add(&cert, None).unwrap();

        assert!(matches!(
            store.get_key_access_rules(cert.fingerprint()),
            Err(Error::PrivateKeyNotFound(_))
        ));
    }
}
