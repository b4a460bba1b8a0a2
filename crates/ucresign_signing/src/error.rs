//! Error types for key loading, signing and verification.

use std::path::PathBuf;

use thiserror::Error;
use ucresign_manifest::CanonicalError;

use crate::digest::DigestAlgorithm;

/// Errors while loading certificates and private keys.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid PEM: {0}")]
    Pem(#[from] pem::PemError),

    /// No PEM block with the expected label.
    #[error("No {0} block found")]
    MissingBlock(&'static str),

    #[error("Unsupported PEM block: {0}")]
    UnsupportedBlock(String),

    #[error("Invalid certificate: {0}")]
    Certificate(String),

    /// The certificate's key is not RSA.
    #[error("Certificate does not carry an RSA public key: {0}")]
    NotRsa(String),

    #[error("Invalid private key: {0}")]
    PrivateKey(String),

    #[error("Private key is encrypted but no password was given")]
    PasswordRequired,

    #[error("Cannot decrypt private key: {0}")]
    Decrypt(String),

    #[error("Unsupported PEM cipher: {0}")]
    UnsupportedCipher(String),

    #[error("Private key does not match the signing certificate")]
    KeyMismatch,
}

/// Reasons a signature block does not verify.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Document carries no signature block")]
    MissingSignature,

    #[error("Signature carries no certificates")]
    NoCertificates,

    #[error("Invalid signer certificate: {0}")]
    Certificate(#[from] KeyError),

    #[error("Cannot encode manifest: {0}")]
    Encoding(#[from] CanonicalError),

    #[error("Provided and computed {algorithm} digests differ: {computed} vs {provided}")]
    DigestMismatch {
        algorithm: DigestAlgorithm,
        computed: String,
        provided: String,
    },

    #[error("Cannot decode {algorithm} signature: {reason}")]
    SignatureEncoding {
        algorithm: DigestAlgorithm,
        reason: String,
    },

    #[error("{algorithm} signature verification failed")]
    BadSignature { algorithm: DigestAlgorithm },
}

impl VerifyError {
    /// The hash whose check failed, if the failure is hash specific.
    pub fn algorithm(&self) -> Option<DigestAlgorithm> {
        match self {
            Self::DigestMismatch { algorithm, .. }
            | Self::SignatureEncoding { algorithm, .. }
            | Self::BadSignature { algorithm } => Some(*algorithm),
            _ => None,
        }
    }
}

/// Errors while producing a signature.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("Cannot encode manifest: {0}")]
    Encoding(#[from] CanonicalError),

    #[error("Cannot sign with {algorithm}: {source}")]
    Rsa {
        algorithm: DigestAlgorithm,
        #[source]
        source: rsa::Error,
    },

    /// A signature this process just produced does not verify. This points
    /// at a defect in the signer or the encoder, never at input data.
    #[error("Produced signature failed self-verification: {0}")]
    SelfVerification(#[source] VerifyError),
}

impl SigningError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SelfVerification(_))
    }
}
