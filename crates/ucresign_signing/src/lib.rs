//! # ucresign_signing
//!
//! Dual-hash RSA signatures over canonically encoded update-center
//! manifests.
//!
//! Every signature carries a SHA-1 and a SHA-512 PKCS#1 v1.5 signature
//! over the same canonical bytes, in the mixed hex/base64 layout clients
//! expect.

pub mod digest;
mod error;
pub mod keys;
mod legacy_pem;
mod signer;
pub mod verifier;

pub use digest::DigestAlgorithm;
pub use error::{KeyError, SigningError, VerifyError};
pub use keys::CertificateInfo;
pub use signer::SignatureEngine;

use ucresign_manifest::{Manifest, Signature};

/// Signs and verifies manifests.
pub trait ManifestSigner: Send + Sync {
    /// Sign `manifest` and self-verify the result. A self-verification
    /// failure is reported as [`SigningError::SelfVerification`].
    fn sign(&self, manifest: &Manifest) -> Result<Signature, SigningError>;

    /// Verify `signature` over `manifest` using its embedded signer
    /// certificate.
    fn verify(&self, manifest: &Manifest, signature: &Signature) -> Result<(), VerifyError>;
}
