// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! File-system-backed trust store for X.509 certificates, private-key
//! bundles, and certificate revocation lists.
//!
//! A store root fixes three subdirectories: `certs/` for DER-encoded public
//! certificates, `private/` for PKCS#12 key bundles (or presence-only `.pem`
//! markers), and `crl/` for raw revocation lists. An in-memory index keyed
//! by fingerprint is rebuilt from directory contents whenever they change.
//!
//! ```rust,no_run
//! use trustdir::{CertStore, StoredCertificate};
//!
//! let store = CertStore::new();
//! store.open("/var/lib/trustdir");
//!
//! let cert = StoredCertificate::from_der(std::fs::read("peer.der")?)?;
//! store.add(&cert, None)?;
//!
//! for cert in store.enumerate()? {
//!     println!("{}  {}", cert.fingerprint(), cert.subject());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Concurrency: one lock inside [`CertStore`] guards the paths and the
//! index; store operations hold it for their full duration and may block on
//! I/O. Nothing coordinates multiple processes sharing a store directory —
//! concurrent writers can race, mitigated only by per-file skip-on-error
//! during scans.

/// Access rules for the store's directories.
pub mod access;
/// Certificate handles and PKCS#12 bundles.
pub mod cert;
/// Store paths and open options.
pub mod config;
/// Revocation lists and the revocation-check algorithm.
pub mod crl;
/// Error types.
pub mod error;
/// Filesystem utilities.
pub mod fs;
/// The directory-backed certificate index.
pub mod index;
/// Private-key resolution.
pub mod keys;
/// File naming for store entries.
pub mod naming;
/// The certificate store.
pub mod store;
/// X.509 certificate parsing.
pub mod x509;

#[cfg(test)]
mod testutil;

pub use access::{AccessRuleProvider, AccessRules, FilePermissionRules};
pub use cert::StoredCertificate;
pub use config::{StoreOptions, StorePaths, CERTS_SUBDIR, CRL_SUBDIR, PRIVATE_SUBDIR};
pub use crl::{Crl, CrlManager, RevocationStatus};
pub use error::{Error, Result};
pub use fs::{FileAccess, StdFileAccess};
pub use index::Entry;
pub use keys::KeyQuery;
pub use naming::{file_base_name, sanitize};
pub use store::CertStore;
pub use x509::{fingerprint, CertMeta};
