// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Test-only helpers for minting certificate material.

use rcgen::{
    BasicConstraints, CertificateParams, CertificateRevocationListParams, DnType, IsCa, Issuer,
    KeyIdMethod, KeyPair, KeyUsagePurpose, RevokedCertParams, SerialNumber,
};
use time::{Duration, OffsetDateTime};

/// A throwaway CA that can issue certificates and sign CRLs.
pub(crate) struct TestCa {
    key_pem: String,
    pub(crate) cert_pem: String,
    pub(crate) cert_der: Vec<u8>,
}

impl TestCa {
    pub(crate) fn new(cn: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        let now = OffsetDateTime::now_utc();
        params.not_before = now - Duration::days(1);
        params.not_after = now + Duration::days(30);
        let cert = params.self_signed(&key).unwrap();

        Self {
            key_pem: key.serialize_pem(),
            cert_pem: cert.pem(),
            cert_der: cert.der().to_vec(),
        }
    }

    /// An Issuer for signing. Recreates the KeyPair because Issuer takes
    /// ownership.
    pub(crate) fn issuer(&self) -> Issuer<'_, KeyPair> {
        let key = KeyPair::from_pem(&self.key_pem).unwrap();
        Issuer::from_ca_cert_pem(&self.cert_pem, key).unwrap()
    }

    /// Issue an end-entity certificate. Returns (certificate DER, PKCS#8
    /// key DER). Serial bytes should keep their MSB clear so the DER
    /// integer encoding matches the input.
    pub(crate) fn issue(&self, cn: &str, serial: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.serial_number = Some(SerialNumber::from_slice(serial));
        let now = OffsetDateTime::now_utc();
        params.not_before = now - Duration::days(1);
        params.not_after = now + Duration::days(30);
        let cert = params.signed_by(&key, &self.issuer()).unwrap();

        (cert.der().to_vec(), key.serialize_der())
    }

    /// Sign a CRL revoking `serials`, valid over the given window.
    pub(crate) fn crl(
        &self,
        serials: &[&[u8]],
        this_update: OffsetDateTime,
        next_update: OffsetDateTime,
    ) -> Vec<u8> {
        let params = CertificateRevocationListParams {
            this_update,
            next_update,
            crl_number: SerialNumber::from_slice(&[0x01]),
            issuing_distribution_point: None,
            revoked_certs: serials
                .iter()
                .map(|serial| RevokedCertParams {
                    serial_number: SerialNumber::from_slice(serial),
                    revocation_time: this_update,
                    reason_code: None,
                    invalidity_date: None,
                })
                .collect(),
            key_identifier_method: KeyIdMethod::Sha256,
        };
        params.signed_by(&self.issuer()).unwrap().der().to_vec()
    }
}
