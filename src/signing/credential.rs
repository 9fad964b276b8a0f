// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing credential capability and the FIEL file-based implementation.
//!
//! The signature builders only see the [`Credential`] trait: a signing
//! primitive plus the certificate metadata embedded in `<KeyInfo>`. Callers
//! pass a credential explicitly to every operation; nothing here is global.
//!
//! [`FielCredential`] opens the certificate (`.cer` DER or PEM) and private
//! key (`.key` password-protected PKCS#8 DER, or PEM) issued by the SAT.

use std::{fmt, fs, path::Path};

use pkcs8::{DecodePrivateKey, DecodePublicKey, EncryptedPrivateKeyInfo};
use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs1v15::SigningKey,
    signature::{SignatureEncoding, Signer},
    BigUint, RsaPrivateKey, RsaPublicKey,
};
use sha1::Sha1;
use tracing::debug;
use x509_cert::{
    der::{asn1::ObjectIdentifier, Decode, DecodePem, Encode},
    Certificate,
};

use crate::error::{DescargaError, Result};

/// Subject attribute carrying `"RFC / CURP"` in SAT certificates.
const X500_UNIQUE_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.45");

/// Hash used by the signing primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// RSA PKCS#1 v1.5 over SHA-1, as required by `xmldsig#rsa-sha1`.
    Sha1,
}

/// A private-key credential able to sign and describe its certificate.
///
/// Implementations must be safe to share across concurrent operations: each
/// `sign` call is independent and must not rely on shared mutable state.
pub trait Credential: Send + Sync {
    /// Sign `data`, returning the raw signature bytes.
    fn sign(&self, data: &[u8], algorithm: SignatureAlgorithm) -> Result<Vec<u8>>;

    /// The certificate as a PEM document.
    fn certificate_pem(&self) -> String;

    /// The certificate serial number in decimal.
    fn certificate_serial_decimal(&self) -> String;

    /// The certificate issuer as an RFC 4514 distinguished name.
    fn certificate_issuer_rfc4514(&self) -> String;

    /// The taxpayer identifier (RFC) of the certificate subject.
    fn subject_rfc(&self) -> String;
}

/// A FIEL (e.firma) credential loaded from the SAT-issued files.
#[derive(Clone)]
pub struct FielCredential {
    certificate_pem: String,
    serial_decimal: String,
    issuer: String,
    rfc: String,
    signing_key: SigningKey<Sha1>,
}

impl FielCredential {
    /// Open the certificate and private key files.
    pub fn open_files(
        certificate_path: impl AsRef<Path>,
        private_key_path: impl AsRef<Path>,
        password: &str,
    ) -> Result<Self> {
        let certificate_path = certificate_path.as_ref();
        let private_key_path = private_key_path.as_ref();
        let certificate = fs::read(certificate_path).map_err(|e| {
            DescargaError::Credential(format!(
                "failed to read {}: {e}",
                certificate_path.display()
            ))
        })?;
        let private_key = fs::read(private_key_path).map_err(|e| {
            DescargaError::Credential(format!(
                "failed to read {}: {e}",
                private_key_path.display()
            ))
        })?;
        Self::from_bytes(&certificate, &private_key, password)
    }

    /// Build a credential from certificate and key contents (DER or PEM).
    pub fn from_bytes(certificate: &[u8], private_key: &[u8], password: &str) -> Result<Self> {
        let certificate = parse_certificate(certificate)?;
        let private_key = parse_private_key(private_key, password)?;

        let spki_der = certificate
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| DescargaError::Credential(format!("invalid public key info: {e}")))?;
        let public_key = RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|e| DescargaError::Credential(format!("certificate key is not RSA: {e}")))?;
        if public_key != private_key.to_public_key() {
            return Err(DescargaError::Credential(
                "certificate does not belong to the private key".to_string(),
            ));
        }

        let der = certificate
            .to_der()
            .map_err(|e| DescargaError::Credential(format!("failed to encode certificate: {e}")))?;
        let certificate_pem = pem::encode(&pem::Pem::new("CERTIFICATE", der));
        let serial_decimal =
            BigUint::from_bytes_be(certificate.tbs_certificate.serial_number.as_bytes())
                .to_string();
        let issuer = certificate.tbs_certificate.issuer.to_string();
        let rfc = subject_rfc(&certificate)?;

        debug!(rfc = %rfc, serial = %serial_decimal, "Loaded FIEL credential");

        Ok(Self {
            certificate_pem,
            serial_decimal,
            issuer,
            rfc,
            signing_key: SigningKey::<Sha1>::new(private_key),
        })
    }
}

impl Credential for FielCredential {
    fn sign(&self, data: &[u8], algorithm: SignatureAlgorithm) -> Result<Vec<u8>> {
        match algorithm {
            SignatureAlgorithm::Sha1 => self
                .signing_key
                .try_sign(data)
                .map(|signature| signature.to_vec())
                .map_err(|e| DescargaError::Signing(e.to_string())),
        }
    }

    fn certificate_pem(&self) -> String {
        self.certificate_pem.clone()
    }

    fn certificate_serial_decimal(&self) -> String {
        self.serial_decimal.clone()
    }

    fn certificate_issuer_rfc4514(&self) -> String {
        self.issuer.clone()
    }

    fn subject_rfc(&self) -> String {
        self.rfc.clone()
    }
}

impl fmt::Debug for FielCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FielCredential")
            .field("rfc", &self.rfc)
            .field("serial", &self.serial_decimal)
            .finish_non_exhaustive()
    }
}

fn is_pem(contents: &[u8]) -> bool {
    contents
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .is_some_and(|start| contents[start..].starts_with(b"-----BEGIN"))
}

fn parse_certificate(contents: &[u8]) -> Result<Certificate> {
    let parsed = if is_pem(contents) {
        Certificate::from_pem(contents)
    } else {
        Certificate::from_der(contents)
    };
    parsed.map_err(|e| DescargaError::Credential(format!("invalid certificate: {e}")))
}

fn parse_private_key(contents: &[u8], password: &str) -> Result<RsaPrivateKey> {
    if !is_pem(contents) {
        return match EncryptedPrivateKeyInfo::try_from(contents) {
            Ok(encrypted) => decrypt_private_key(encrypted, password),
            Err(_) => RsaPrivateKey::from_pkcs8_der(contents)
                .map_err(|e| DescargaError::Credential(format!("invalid private key: {e}"))),
        };
    }

    let text = std::str::from_utf8(contents)
        .map_err(|e| DescargaError::Credential(format!("invalid UTF-8 in private key: {e}")))?;
    let parsed = if text.contains("BEGIN ENCRYPTED PRIVATE KEY") {
        let block = pem::parse(text)
            .map_err(|e| DescargaError::Credential(format!("invalid private key: {e}")))?;
        let encrypted = EncryptedPrivateKeyInfo::try_from(block.contents())
            .map_err(|e| DescargaError::Credential(format!("invalid private key: {e}")))?;
        return decrypt_private_key(encrypted, password);
    } else if text.contains("BEGIN RSA PRIVATE KEY") {
        return RsaPrivateKey::from_pkcs1_pem(text)
            .map_err(|e| DescargaError::Credential(format!("invalid private key: {e}")));
    } else {
        RsaPrivateKey::from_pkcs8_pem(text)
    };
    parsed.map_err(|e| DescargaError::Credential(format!("invalid private key: {e}")))
}

/// CBC decryption under a wrong password can still end in valid padding, so a
/// decrypted document that fails to parse is reported as a decryption failure.
fn decrypt_private_key(
    encrypted: EncryptedPrivateKeyInfo<'_>,
    password: &str,
) -> Result<RsaPrivateKey> {
    let scheme = encrypted.encryption_algorithm.oid();
    let decrypted = encrypted.decrypt(password).map_err(|e| {
        DescargaError::Credential(format!(
            "cannot decrypt private key ({scheme}): wrong password or unsupported cipher: {e}"
        ))
    })?;
    RsaPrivateKey::from_pkcs8_der(decrypted.as_bytes()).map_err(|e| {
        DescargaError::Credential(format!(
            "cannot decrypt private key ({scheme}): wrong password or corrupt key: {e}"
        ))
    })
}

fn subject_rfc(certificate: &Certificate) -> Result<String> {
    let unique_identifier = certificate
        .tbs_certificate
        .subject
        .0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == X500_UNIQUE_IDENTIFIER)
        .ok_or_else(|| {
            DescargaError::Credential("certificate subject has no x500UniqueIdentifier".into())
        })?;

    let value = std::str::from_utf8(unique_identifier.value.value()).map_err(|e| {
        DescargaError::Credential(format!("invalid x500UniqueIdentifier encoding: {e}"))
    })?;
    let rfc = value.split('/').next().unwrap_or_default().trim();
    if rfc.is_empty() {
        return Err(DescargaError::Credential(
            "certificate subject has an empty RFC".to_string(),
        ));
    }
    Ok(rfc.to_ascii_uppercase())
}

#[cfg(test)]
pub(crate) const TEST_CERTIFICATE_DER: &[u8] = include_bytes!("../../testdata/certificate.cer");
#[cfg(test)]
pub(crate) const TEST_PRIVATE_KEY_DER: &[u8] = include_bytes!("../../testdata/private_key.key");
#[cfg(test)]
pub(crate) const TEST_DES3_PRIVATE_KEY_DER: &[u8] =
    include_bytes!("../../testdata/private_key_des3.key");
#[cfg(test)]
pub(crate) const TEST_PASSWORD: &str = "12345678a";

/// The fixture credential under `testdata/`.
#[cfg(test)]
pub(crate) fn test_credential() -> FielCredential {
    FielCredential::from_bytes(TEST_CERTIFICATE_DER, TEST_PRIVATE_KEY_DER, TEST_PASSWORD)
        .expect("fixture credential should load")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEST_CERTIFICATE_PEM: &[u8] = include_bytes!("../../testdata/certificate.pem");
    const TEST_PRIVATE_KEY_PEM: &[u8] = include_bytes!("../../testdata/private_key.pem");

    #[test]
    fn loads_der_certificate_and_encrypted_key() {
        let credential = test_credential();
        assert_eq!(credential.subject_rfc(), "EKU9003173C9");
        assert_eq!(
            credential.certificate_serial_decimal(),
            "292233162870206001759766198462772978647764840758"
        );
        assert!(credential
            .certificate_issuer_rfc4514()
            .contains("CN=ESCUELA KEMPER URGATE SA DE CV"));
        assert!(credential
            .certificate_pem()
            .starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn pem_and_der_inputs_describe_the_same_certificate() {
        let from_pem =
            FielCredential::from_bytes(TEST_CERTIFICATE_PEM, TEST_PRIVATE_KEY_PEM, "").unwrap();
        let from_der = test_credential();
        assert_eq!(from_pem.certificate_pem(), from_der.certificate_pem());
        assert_eq!(from_pem.subject_rfc(), from_der.subject_rfc());
    }

    #[test]
    fn wrong_password_is_a_credential_error() {
        let result =
            FielCredential::from_bytes(TEST_CERTIFICATE_DER, TEST_PRIVATE_KEY_DER, "wrong");
        match result {
            Err(DescargaError::Credential(message)) => {
                assert!(message.contains("cannot decrypt private key"), "{message}");
                assert!(message.contains("wrong password"), "{message}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn loads_des3_encrypted_key() {
        let credential = FielCredential::from_bytes(
            TEST_CERTIFICATE_DER,
            TEST_DES3_PRIVATE_KEY_DER,
            TEST_PASSWORD,
        )
        .unwrap();
        assert_eq!(credential.subject_rfc(), "EKU9003173C9");

        let reference = test_credential();
        assert_eq!(
            credential.sign(b"payload", SignatureAlgorithm::Sha1).unwrap(),
            reference.sign(b"payload", SignatureAlgorithm::Sha1).unwrap()
        );
    }

    #[test]
    fn des3_key_with_wrong_password_reports_decryption() {
        let result =
            FielCredential::from_bytes(TEST_CERTIFICATE_DER, TEST_DES3_PRIVATE_KEY_DER, "wrong");
        match result {
            Err(DescargaError::Credential(message)) => {
                assert!(message.contains("cannot decrypt private key"), "{message}")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn garbage_certificate_is_rejected() {
        let result = FielCredential::from_bytes(b"not a certificate", TEST_PRIVATE_KEY_DER, "");
        assert!(matches!(result, Err(DescargaError::Credential(_))));
    }

    #[test]
    fn signing_is_deterministic() {
        let credential = test_credential();
        let first = credential.sign(b"payload", SignatureAlgorithm::Sha1).unwrap();
        let second = credential.sign(b"payload", SignatureAlgorithm::Sha1).unwrap();
        assert_eq!(first.len(), 256);
        assert_eq!(first, second);
    }

    #[test]
    fn open_files_reads_credential_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("certificate.cer");
        let key_path = dir.path().join("private_key.key");
        fs::File::create(&cert_path)
            .unwrap()
            .write_all(TEST_CERTIFICATE_DER)
            .unwrap();
        fs::File::create(&key_path)
            .unwrap()
            .write_all(TEST_PRIVATE_KEY_DER)
            .unwrap();

        let credential = FielCredential::open_files(&cert_path, &key_path, TEST_PASSWORD).unwrap();
        assert_eq!(credential.subject_rfc(), "EKU9003173C9");
    }

    #[test]
    fn open_files_reports_missing_paths() {
        let result = FielCredential::open_files("/nonexistent.cer", "/nonexistent.key", "");
        match result {
            Err(DescargaError::Credential(message)) => assert!(message.contains("/nonexistent.cer")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
