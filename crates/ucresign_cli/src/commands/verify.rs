//! Signature verification command

use std::path::Path;

use miette::{IntoDiagnostic, Result, WrapErr};
use tracing::error;
use ucresign_manifest::{Envelope, SignedManifest};
use ucresign_signing::{CertificateInfo, VerifyError, verifier};

/// Returns `true` when the signature does not verify.
pub fn run_verify(file: &Path, envelope: Envelope, certificate: Option<&Path>) -> Result<bool> {
    let data = std::fs::read(file)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", file.display()))?;
    let payload = envelope.strip_bytes(&data).into_diagnostic()?;
    let signed: SignedManifest = serde_json::from_slice(payload)
        .into_diagnostic()
        .wrap_err("Failed to decode update-center document")?;

    let trusted = match certificate {
        Some(path) => {
            let pem = std::fs::read(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
            Some(CertificateInfo::from_pem(&pem).into_diagnostic()?)
        }
        None => None,
    };

    match check(&signed, trusted.as_ref()) {
        Ok(subject) => {
            println!("signature OK ({subject})");
            Ok(false)
        }
        Err(e) => {
            error!("Signature verification failed: {e}");
            Ok(true)
        }
    }
}

fn check(signed: &SignedManifest, trusted: Option<&CertificateInfo>) -> Result<String, VerifyError> {
    let signature = signed.signature.as_ref().ok_or(VerifyError::MissingSignature)?;
    match trusted {
        Some(cert) => {
            verifier::verify_manifest_with(&signed.manifest, signature, cert)?;
            Ok(cert.subject())
        }
        None => {
            let cert = verifier::signer_certificate(signature)?;
            verifier::verify_manifest_with(&signed.manifest, signature, &cert)?;
            Ok(cert.subject())
        }
    }
}
