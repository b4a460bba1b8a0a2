//! Certificate and private key loading.

use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use pkcs8::DecodePrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::Certificate;
use x509_cert::der::{Decode, Encode};

use crate::error::KeyError;
use crate::legacy_pem;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// A parsed X.509 certificate with the DER bytes it was decoded from.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    der: Vec<u8>,
    cert: Certificate,
}

impl CertificateInfo {
    pub fn from_der(der: Vec<u8>) -> Result<Self, KeyError> {
        let cert = Certificate::from_der(&der).map_err(|e| KeyError::Certificate(e.to_string()))?;
        Ok(Self { der, cert })
    }

    /// Decode the base64 DER form used in signature blocks.
    pub fn from_base64(text: &str) -> Result<Self, KeyError> {
        let der = BASE64
            .decode(text.trim())
            .map_err(|e| KeyError::Certificate(e.to_string()))?;
        Self::from_der(der)
    }

    /// First `CERTIFICATE` block of a PEM document.
    pub fn from_pem(data: &[u8]) -> Result<Self, KeyError> {
        let block = pem::parse_many(data)?
            .into_iter()
            .find(|p| p.tag() == CERTIFICATE_LABEL)
            .ok_or(KeyError::MissingBlock(CERTIFICATE_LABEL))?;
        Self::from_der(block.into_contents())
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.der)
    }

    pub fn subject(&self) -> String {
        self.cert.tbs_certificate.subject.to_string()
    }

    pub fn issuer(&self) -> String {
        self.cert.tbs_certificate.issuer.to_string()
    }

    /// Whether `other`'s subject is this certificate's issuer.
    pub fn is_issued_by(&self, other: &CertificateInfo) -> bool {
        self.cert.tbs_certificate.issuer == other.cert.tbs_certificate.subject
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        to_datetime(self.cert.tbs_certificate.validity.not_before.to_unix_duration())
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        to_datetime(self.cert.tbs_certificate.validity.not_after.to_unix_duration())
    }

    pub fn public_key(&self) -> Result<RsaPublicKey, KeyError> {
        let spki = self
            .cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| KeyError::Certificate(e.to_string()))?;
        RsaPublicKey::from_public_key_der(&spki).map_err(|e| KeyError::NotRsa(e.to_string()))
    }
}

fn to_datetime(since_epoch: Duration) -> DateTime<Utc> {
    DateTime::<Utc>::from(UNIX_EPOCH + since_epoch)
}

pub fn read_file(path: &Path) -> Result<Vec<u8>, KeyError> {
    std::fs::read(path).map_err(|source| KeyError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Every `CERTIFICATE` block of a PEM bundle.
pub fn parse_certificate_bundle(data: &[u8]) -> Result<Vec<CertificateInfo>, KeyError> {
    pem::parse_many(data)?
        .into_iter()
        .filter(|p| p.tag() == CERTIFICATE_LABEL)
        .map(|p| CertificateInfo::from_der(p.into_contents()))
        .collect()
}

/// Decode an RSA private key from PEM.
///
/// Accepts PKCS#1 (`RSA PRIVATE KEY`) and PKCS#8 (`PRIVATE KEY`), either in
/// the clear, encrypted as PKCS#8 (`ENCRYPTED PRIVATE KEY`), or with legacy
/// OpenSSL PEM encryption headers.
pub fn parse_private_key(data: &[u8], password: Option<&str>) -> Result<RsaPrivateKey, KeyError> {
    let block = pem::parse_many(data)?
        .into_iter()
        .find(|p| p.tag().ends_with("PRIVATE KEY"))
        .ok_or(KeyError::MissingBlock("PRIVATE KEY"))?;

    match block.tag() {
        "ENCRYPTED PRIVATE KEY" => {
            let password = password.ok_or(KeyError::PasswordRequired)?;
            RsaPrivateKey::from_pkcs8_encrypted_der(block.contents(), password)
                .map_err(|e| KeyError::Decrypt(e.to_string()))
        }
        "RSA PRIVATE KEY" | "PRIVATE KEY" => {
            if legacy_pem::is_encrypted(&block) {
                let password = password.ok_or(KeyError::PasswordRequired)?;
                let der = legacy_pem::decrypt(&block, password.as_bytes())?;
                decode_private_der(&der)
            } else {
                decode_private_der(block.contents())
            }
        }
        other => Err(KeyError::UnsupportedBlock(other.to_string())),
    }
}

/// PKCS#1 first, then PKCS#8.
fn decode_private_der(der: &[u8]) -> Result<RsaPrivateKey, KeyError> {
    RsaPrivateKey::from_pkcs1_der(der)
        .or_else(|_| RsaPrivateKey::from_pkcs8_der(der))
        .map_err(|e| KeyError::PrivateKey(e.to_string()))
}
