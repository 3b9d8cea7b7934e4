// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use directories::{BaseDirs, ProjectDirs};
use std::path::{Path, PathBuf};

/// Subdirectory holding public certificates (`*.der`).
pub const CERTS_SUBDIR: &str = "certs";
/// Subdirectory holding private-key bundles and markers (`*.pfx`, `*.pem`).
pub const PRIVATE_SUBDIR: &str = "private";
/// Subdirectory holding revocation lists (`*.crl`).
pub const CRL_SUBDIR: &str = "crl";

/// The store root and the three subdirectory paths it fixes.
///
/// Opening a store only fixes these paths; none of the directories need to
/// exist until something is written into them.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub root: PathBuf,
    pub certs_dir: PathBuf,
    pub private_dir: PathBuf,
    pub crl_dir: PathBuf,
}

impl StorePaths {
    /// Fix the subdirectory paths for a store root.
    ///
    /// The root is canonicalized when it already exists, so that two opens
    /// through different spellings of the same directory agree on paths.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Self {
            certs_dir: root.join(CERTS_SUBDIR),
            private_dir: root.join(PRIVATE_SUBDIR),
            crl_dir: root.join(CRL_SUBDIR),
            root,
        }
    }

    /// Resolve the default store root.
    ///
    /// `TRUSTDIR_ROOT` wins when set (and must be absolute); otherwise the
    /// platform data directory is used.
    pub fn default_root() -> Result<PathBuf> {
        if let Ok(custom_root) = std::env::var("TRUSTDIR_ROOT") {
            let path = PathBuf::from(&custom_root);
            if !path.is_absolute() {
                return Err(Error::Config(format!(
                    "TRUSTDIR_ROOT must be an absolute path, got: {}",
                    custom_root
                )));
            }
            return Ok(path);
        }

        if let Some(proj_dirs) = ProjectDirs::from("", "", "trustdir") {
            Ok(proj_dirs.data_dir().to_path_buf())
        } else if let Some(base_dirs) = BaseDirs::new() {
            Ok(base_dirs.home_dir().join(".trustdir"))
        } else {
            Err(Error::Config(
                "Could not determine a home directory; set TRUSTDIR_ROOT".to_string(),
            ))
        }
    }
}

/// Options fixed when a store is opened.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// When false, the private-keys directory is ignored entirely: the index
    /// neither loads bundles nor considers the directory's modification time
    /// for cache validity.
    pub private_keys: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { private_keys: true }
    }
}
