// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! File names for store entries.
//!
//! Every file a certificate owns in the store shares one base name derived
//! from its common name and fingerprint, so the public certificate, its
//! private-key bundle, and its presence-only key marker can be matched up
//! without any side index.

use crate::cert::StoredCertificate;

/// Extension of public certificates (DER-encoded).
pub const CERT_EXT: &str = "der";
/// Extension of password-protected key+certificate bundles (PKCS#12).
pub const BUNDLE_EXT: &str = "pfx";
/// Extension of presence-only private-key markers (never parsed).
pub const KEY_MARKER_EXT: &str = "pem";
/// Extension of certificate revocation lists (raw bytes).
pub const CRL_EXT: &str = "crl";

/// Characters that are unsafe in file names on at least one supported
/// platform. Each is replaced with `+` rather than rejected, since common
/// names are taken from certificates we do not control.
const UNSAFE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Common name used when the certificate subject carries none.
const FALLBACK_NAME: &str = "certificate";

/// Replace file-name-unsafe characters in a name component with `+`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '+' } else { c })
        .collect()
}

/// Derive the base file name for a certificate: `<common-name> [<fingerprint>]`.
///
/// The fingerprint suffix keeps base names unique even when two certificates
/// share a common name.
pub fn file_base_name(cert: &StoredCertificate) -> String {
    base_name_for(cert.common_name(), cert.fingerprint())
}

pub(crate) fn base_name_for(common_name: Option<&str>, fingerprint: &str) -> String {
    let cn = common_name.unwrap_or(FALLBACK_NAME);
    format!("{} [{}]", sanitize(cn), fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize("A/B<C"), "A+B+C");
        assert_eq!(sanitize(r#"a<b>c:d"e/f\g|h?i*j"#), "a+b+c+d+e+f+g+h+i+j");
        assert_eq!(sanitize("plain name.example"), "plain name.example");
    }

    #[test]
    fn test_base_name_layout() {
        assert_eq!(base_name_for(Some("A/B<C"), "AB12"), "A+B+C [AB12]");
        assert_eq!(base_name_for(Some("server"), "00FF"), "server [00FF]");
    }

    #[test]
    fn test_base_name_without_common_name() {
        assert_eq!(base_name_for(None, "AB12"), "certificate [AB12]");
    }
}
