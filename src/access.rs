// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Access rules for the store's directories.
//!
//! Permission enforcement itself belongs to the platform; the store only
//! passes rule sets through to a provider keyed by filesystem path.

use crate::error::{Error, Result};
use std::path::Path;

/// A rule set applied to a path.
///
/// Expressed as Unix permission bits. On platforms without mode bits the
/// default provider honors only the owner-write bit, via the read-only
/// attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRules {
    pub mode: u32,
}

impl AccessRules {
    /// Owner-only access, the usual choice for key directories.
    pub fn owner_only() -> Self {
        Self { mode: 0o700 }
    }
}

/// External capability that reads and applies access rules by path.
pub trait AccessRuleProvider: Send + Sync {
    fn get_rules(&self, path: &Path) -> Result<AccessRules>;
    fn set_rules(&self, path: &Path, rules: &AccessRules) -> Result<()>;
}

/// Default provider over `std::fs::Permissions`.
pub struct FilePermissionRules;

#[cfg(unix)]
impl AccessRuleProvider for FilePermissionRules {
    fn get_rules(&self, path: &Path) -> Result<AccessRules> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = std::fs::metadata(path).map_err(|e| Error::AccessRules {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(AccessRules {
            mode: metadata.permissions().mode() & 0o7777,
        })
    }

    fn set_rules(&self, path: &Path, rules: &AccessRules) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(rules.mode)).map_err(|e| {
            Error::AccessRules {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })
    }
}

#[cfg(not(unix))]
impl AccessRuleProvider for FilePermissionRules {
    fn get_rules(&self, path: &Path) -> Result<AccessRules> {
        let metadata = std::fs::metadata(path).map_err(|e| Error::AccessRules {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mode = if metadata.permissions().readonly() {
            0o500
        } else {
            0o700
        };
        Ok(AccessRules { mode })
    }

    fn set_rules(&self, path: &Path, rules: &AccessRules) -> Result<()> {
        let metadata = std::fs::metadata(path).map_err(|e| Error::AccessRules {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut permissions = metadata.permissions();
        permissions.set_readonly(rules.mode & 0o200 == 0);
        std::fs::set_permissions(path, permissions).map_err(|e| Error::AccessRules {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
