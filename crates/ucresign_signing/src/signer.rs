//! Signature production with a local certificate and key.

use std::path::Path;

use rsa::RsaPrivateKey;
use tracing::{info, warn};
use ucresign_manifest::{Manifest, Signature, canonical};

use crate::ManifestSigner;
use crate::digest::DigestAlgorithm;
use crate::error::{KeyError, SigningError, VerifyError};
use crate::keys::{self, CertificateInfo};
use crate::verifier;

/// Signs manifests with an operator-controlled certificate and RSA key.
///
/// Immutable once built, so one engine can be shared across refreshes.
pub struct SignatureEngine {
    ca: Vec<CertificateInfo>,
    certificate: CertificateInfo,
    key: RsaPrivateKey,
}

impl std::fmt::Debug for SignatureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureEngine")
            .field("subject", &self.certificate.subject())
            .field("ca", &self.ca.len())
            .finish_non_exhaustive()
    }
}

impl SignatureEngine {
    /// Build from already-loaded material. The key must belong to the
    /// certificate.
    pub fn new(
        ca: Vec<CertificateInfo>,
        certificate: CertificateInfo,
        key: RsaPrivateKey,
    ) -> Result<Self, KeyError> {
        if key.to_public_key() != certificate.public_key()? {
            return Err(KeyError::KeyMismatch);
        }

        if !ca.is_empty() && !ca.iter().any(|root| certificate.is_issued_by(root)) {
            warn!(
                issuer = %certificate.issuer(),
                "Signing certificate is not issued by any configured CA"
            );
        }

        Ok(Self {
            ca,
            certificate,
            key,
        })
    }

    /// Build from PEM contents.
    pub fn from_pem(
        ca: Option<&[u8]>,
        certificate: &[u8],
        key: &[u8],
        password: Option<&str>,
    ) -> Result<Self, KeyError> {
        let ca = match ca {
            Some(bundle) => keys::parse_certificate_bundle(bundle)?,
            None => Vec::new(),
        };
        let certificate = CertificateInfo::from_pem(certificate)?;
        let key = keys::parse_private_key(key, password)?;
        Self::new(ca, certificate, key)
    }

    /// Build from PEM files and log the signing certificate.
    pub fn from_pem_files(
        ca_path: Option<&Path>,
        certificate_path: &Path,
        key_path: &Path,
        password: Option<&str>,
    ) -> Result<Self, KeyError> {
        let ca = ca_path.map(keys::read_file).transpose()?;
        let certificate = keys::read_file(certificate_path)?;
        let key = keys::read_file(key_path)?;

        let engine = Self::from_pem(ca.as_deref(), &certificate, &key, password)?;
        info!(
            subject = %engine.certificate.subject(),
            not_before = %engine.certificate.not_before(),
            not_after = %engine.certificate.not_after(),
            "Loaded signing certificate"
        );
        Ok(engine)
    }

    pub fn certificate(&self) -> &CertificateInfo {
        &self.certificate
    }

    pub fn ca_certificates(&self) -> &[CertificateInfo] {
        &self.ca
    }

    fn sign_digest(&self, algorithm: DigestAlgorithm, digest: &[u8]) -> Result<Vec<u8>, SigningError> {
        self.key
            .sign(algorithm.padding(), digest)
            .map_err(|source| SigningError::Rsa { algorithm, source })
    }
}

impl ManifestSigner for SignatureEngine {
    fn sign(&self, manifest: &Manifest) -> Result<Signature, SigningError> {
        let bytes = canonical::to_vec(manifest)?;

        let digest1 = DigestAlgorithm::Sha1.compute(&bytes);
        let digest512 = DigestAlgorithm::Sha512.compute(&bytes);
        let signature512 = self.sign_digest(DigestAlgorithm::Sha512, &digest512)?;
        let signature1 = self.sign_digest(DigestAlgorithm::Sha1, &digest1)?;

        let signature = Signature {
            certificates: vec![self.certificate.to_base64()],
            digest: DigestAlgorithm::Sha1.encode_digest(&digest1),
            digest512: DigestAlgorithm::Sha512.encode_digest(&digest512),
            signature: DigestAlgorithm::Sha1.encode_signature(&signature1),
            signature512: DigestAlgorithm::Sha512.encode_signature(&signature512),
        };

        let key = self.certificate.public_key()?;
        verifier::verify_bytes(&bytes, &signature, &key).map_err(SigningError::SelfVerification)?;

        Ok(signature)
    }

    fn verify(&self, manifest: &Manifest, signature: &Signature) -> Result<(), VerifyError> {
        verifier::verify_manifest(manifest, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ucresign_manifest::{Envelope, Patcher, SignedManifest, UrlPatcher};

    const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/fixtures");

    fn path(name: &str) -> std::path::PathBuf {
        Path::new(FIXTURES).join(name)
    }

    fn engine(name: &str) -> SignatureEngine {
        SignatureEngine::from_pem_files(
            None,
            &path(&format!("certs/{name}.crt")),
            &path(&format!("certs/{name}.key")),
            None,
        )
        .unwrap()
    }

    fn upstream() -> SignedManifest {
        let raw = std::fs::read(path("update-center/upstream.jsonp")).unwrap();
        serde_json::from_slice(Envelope::Jsonp.strip_bytes(&raw).unwrap()).unwrap()
    }

    #[test]
    fn sign_then_verify_roundtrip() {
        let signer = engine("mirror");
        let manifest = upstream().manifest;

        let signature = signer.sign(&manifest).unwrap();
        signer.verify(&manifest, &signature).unwrap();

        assert_eq!(signature.certificates, vec![signer.certificate().to_base64()]);
        assert_eq!(signature.digest.len(), 40);
        assert!(signature.digest512.ends_with("=="));
        assert_eq!(signature.signature512.len(), 512);
        assert!(signature.signature512.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = engine("mirror");
        let manifest = upstream().manifest;
        assert_eq!(signer.sign(&manifest).unwrap(), signer.sign(&manifest).unwrap());
    }

    #[test]
    fn upstream_fixture_verifies() {
        let signed = upstream();
        verifier::verify_manifest(&signed.manifest, signed.signature.as_ref().unwrap()).unwrap();
    }

    #[test]
    fn patched_and_resigned_manifest_verifies_only_with_the_new_certificate() {
        let original = engine("upstream");
        let mirror = engine("mirror");
        let mut manifest = upstream().manifest;

        UrlPatcher::new("https://updates.jenkins.io", "https://mirror.example.org")
            .unwrap()
            .patch(&mut manifest)
            .unwrap();
        let signature = mirror.sign(&manifest).unwrap();

        assert_eq!(
            manifest.core.as_ref().unwrap().url(),
            Some("https://mirror.example.org/download/war/2.400/jenkins.war")
        );
        verifier::verify_manifest_with(&manifest, &signature, mirror.certificate()).unwrap();
        assert!(verifier::verify_manifest_with(&manifest, &signature, original.certificate()).is_err());
    }

    #[test]
    fn rejects_key_of_another_certificate() {
        let result = SignatureEngine::from_pem_files(
            None,
            &path("certs/mirror.crt"),
            &path("certs/upstream.key"),
            None,
        );
        assert!(matches!(result, Err(KeyError::KeyMismatch)));
    }

    #[test]
    fn accepts_encrypted_key_and_ca_bundle() {
        let signer = SignatureEngine::from_pem_files(
            Some(&path("certs/mirror.crt")),
            &path("certs/mirror.crt"),
            &path("certs/mirror-legacy-encrypted.key"),
            Some("changeit"),
        )
        .unwrap();
        assert_eq!(signer.ca_certificates().len(), 1);

        let manifest = upstream().manifest;
        let signature = signer.sign(&manifest).unwrap();
        signer.verify(&manifest, &signature).unwrap();
    }
}
