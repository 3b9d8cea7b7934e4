// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Store is not open. Call open() with the store root first.")]
    StoreNotOpen,

    #[error("A certificate with fingerprint {0} already exists in the store")]
    DuplicateFingerprint(String),

    #[error("No certificate with fingerprint {0} exists in the store")]
    EntryNotFound(String),

    #[error("Certificate {0} has no private-key file in the store")]
    PrivateKeyNotFound(String),

    #[error("No certificate in the store matches the CRL issuer '{0}'")]
    CrlIssuerNotFound(String),

    #[error("A fingerprint or subject filter is required to load a private key")]
    MissingKeyQuery,

    #[error("Directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid path (non-UTF8): {0}")]
    InvalidPath(PathBuf),

    #[error("Failed to parse certificate: {0}")]
    CertParse(String),

    #[error("Failed to parse CRL: {0}")]
    CrlParse(String),

    #[error("PKCS#12 operation failed: {0}")]
    Pkcs12(String),

    #[error("Access rule operation failed on {path}: {reason}")]
    AccessRules { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
