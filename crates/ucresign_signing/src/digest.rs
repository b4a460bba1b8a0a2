use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::Pkcs1v15Sign;
use sha1::Sha1;
use sha2::{Digest, Sha512};

/// The two hashes every update-center signature carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha1,
    Sha512,
}

impl DigestAlgorithm {
    /// Checked in this order when verifying.
    pub const ALL: [DigestAlgorithm; 2] = [DigestAlgorithm::Sha512, DigestAlgorithm::Sha1];

    pub fn compute(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha1 => Sha1::digest(bytes).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(bytes).to_vec(),
        }
    }

    pub(crate) fn padding(self) -> Pkcs1v15Sign {
        match self {
            DigestAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
            DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        }
    }

    /// Text form stored in the `correct_digest*` field.
    pub fn encode_digest(self, digest: &[u8]) -> String {
        match self {
            DigestAlgorithm::Sha1 => hex::encode(digest),
            DigestAlgorithm::Sha512 => BASE64.encode(digest),
        }
    }

    /// Text form stored in the `correct_signature*` field.
    pub fn encode_signature(self, signature: &[u8]) -> String {
        match self {
            DigestAlgorithm::Sha1 => BASE64.encode(signature),
            DigestAlgorithm::Sha512 => hex::encode(signature),
        }
    }

    pub fn decode_signature(self, text: &str) -> Result<Vec<u8>, String> {
        match self {
            DigestAlgorithm::Sha1 => BASE64.decode(text).map_err(|e| e.to_string()),
            DigestAlgorithm::Sha512 => hex::decode(text).map_err(|e| e.to_string()),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Sha1 => write!(f, "SHA-1"),
            DigestAlgorithm::Sha512 => write!(f, "SHA-512"),
        }
    }
}

/// Producers have mixed hex and base64 for both hashes, so either encoding
/// is accepted, ignoring case.
pub fn digest_matches(computed: &[u8], provided: &str) -> bool {
    provided.eq_ignore_ascii_case(&hex::encode(computed))
        || provided.eq_ignore_ascii_case(&BASE64.encode(computed))
}
