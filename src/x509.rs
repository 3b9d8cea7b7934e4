// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Parse X.509 certificates without shelling out to openssl.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

/// Owned metadata extracted from a DER-encoded certificate.
///
/// `x509-parser` types borrow from the input buffer; the store keeps scans
/// and lookups allocation-simple by copying out the handful of fields it
/// actually matches on.
#[derive(Debug, Clone)]
pub struct CertMeta {
    /// SHA-256 over the DER encoding, uppercase hex.
    pub fingerprint: String,
    /// Subject distinguished name, rendered as a string.
    pub subject: String,
    /// Issuer distinguished name, rendered as a string.
    pub issuer: String,
    /// Raw serial number bytes as they appear in the certificate.
    pub serial: Vec<u8>,
    pub common_name: Option<String>,
    pub not_before_timestamp: i64,
    pub not_after_timestamp: i64,
}

/// Compute the store fingerprint of a DER-encoded certificate.
pub fn fingerprint(der: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(der))
}

pub fn parse_cert_der(der: &[u8]) -> Result<CertMeta> {
    let (rest, cert) = X509Certificate::from_der(der)
        .map_err(|e| Error::CertParse(format!("Invalid X.509: {}", e)))?;
    if !rest.is_empty() {
        return Err(Error::CertParse(format!(
            "{} trailing bytes after certificate",
            rest.len()
        )));
    }

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(String::from);

    Ok(CertMeta {
        fingerprint: fingerprint(der),
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial: cert.raw_serial().to_vec(),
        common_name,
        not_before_timestamp: cert.validity().not_before.timestamp(),
        not_after_timestamp: cert.validity().not_after.timestamp(),
    })
}

/// Whether `subject_dn` satisfies a caller-supplied subject filter.
///
/// A filter that contains `=` is treated as a full distinguished name and
/// must match exactly. Anything else is treated as a bare common name and
/// matches if the DN contains a `CN=<filter>` component.
pub(crate) fn subject_matches(subject_dn: &str, filter: &str) -> bool {
    if filter.contains('=') {
        subject_dn == filter
    } else {
        subject_dn.contains(&format!("CN={}", filter))
    }
}

/// Case-insensitive fingerprint comparison. Fingerprints are hex strings,
/// so ASCII case folding is sufficient.
pub(crate) fn fingerprint_matches(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
