//! Signature verification.

use rsa::RsaPublicKey;
use ucresign_manifest::{Manifest, Signature, canonical};

use crate::digest::{DigestAlgorithm, digest_matches};
use crate::error::VerifyError;
use crate::keys::CertificateInfo;

/// Verify `signature` over `manifest` with the key of the first embedded
/// certificate.
pub fn verify_manifest(manifest: &Manifest, signature: &Signature) -> Result<(), VerifyError> {
    let cert = signer_certificate(signature)?;
    verify_manifest_with(manifest, signature, &cert)
}

/// Verify `signature` over `manifest` with an explicitly trusted
/// certificate, ignoring the embedded ones.
pub fn verify_manifest_with(
    manifest: &Manifest,
    signature: &Signature,
    certificate: &CertificateInfo,
) -> Result<(), VerifyError> {
    let key = certificate.public_key()?;
    let bytes = canonical::to_vec(manifest)?;
    verify_bytes(&bytes, signature, &key)
}

/// The first certificate of the signature block.
pub fn signer_certificate(signature: &Signature) -> Result<CertificateInfo, VerifyError> {
    let first = signature
        .certificates
        .first()
        .ok_or(VerifyError::NoCertificates)?;
    Ok(CertificateInfo::from_base64(first)?)
}

/// Verify both hashes over already-encoded canonical bytes.
pub fn verify_bytes(canonical: &[u8], signature: &Signature, key: &RsaPublicKey) -> Result<(), VerifyError> {
    DigestAlgorithm::ALL
        .into_iter()
        .try_for_each(|algorithm| check(algorithm, canonical, signature, key))
}

/// Check one hash: the provided digest must match the computed one, and the
/// RSA PKCS#1 v1.5 signature must verify over the computed digest.
pub fn check(
    algorithm: DigestAlgorithm,
    canonical: &[u8],
    signature: &Signature,
    key: &RsaPublicKey,
) -> Result<(), VerifyError> {
    let (provided_digest, provided_signature) = match algorithm {
        DigestAlgorithm::Sha1 => (&signature.digest, &signature.signature),
        DigestAlgorithm::Sha512 => (&signature.digest512, &signature.signature512),
    };

    let computed = algorithm.compute(canonical);
    if !digest_matches(&computed, provided_digest) {
        return Err(VerifyError::DigestMismatch {
            algorithm,
            computed: hex::encode(&computed),
            provided: provided_digest.clone(),
        });
    }

    let raw = algorithm
        .decode_signature(provided_signature)
        .map_err(|reason| VerifyError::SignatureEncoding { algorithm, reason })?;

    key.verify(algorithm.padding(), &computed, &raw)
        .map_err(|_| VerifyError::BadSignature { algorithm })
}
