//! # ucresign_manifest
//!
//! Jenkins update-center manifest types and the byte-exact encodings used
//! to digest, sign and publish them.
//!
//! This crate provides:
//! - The `Manifest` / `SignedManifest` data model (lossless for unknown fields)
//! - Canonical JSON encoding compatible with the upstream signer
//! - The JSONP and HTML envelope codec
//! - URL patchers that redirect downloads to a mirror
//!
//! ## Example
//!
//! ```rust,ignore
//! use ucresign_manifest::{Envelope, Patcher, SignedManifest, UrlPatcher, canonical};
//!
//! let file = std::fs::File::open("update-center.json")?;
//! let reader = Envelope::Jsonp.strip(file)?;
//! let mut signed: SignedManifest = serde_json::from_reader(std::io::BufReader::new(reader))?;
//!
//! UrlPatcher::new("https://updates.jenkins.io", "https://mirror.example.org")?
//!     .patch(&mut signed.manifest)?;
//! let bytes = canonical::to_vec(&signed.manifest)?;
//! ```

pub mod canonical;
pub mod envelope;
mod model;
pub mod patcher;

pub use canonical::CanonicalError;
pub use envelope::{Envelope, EnvelopeError, SectionReader};
pub use model::{CoreEntry, Manifest, PluginEntry, Signature, SignedManifest};
pub use patcher::{PatchError, Patcher, UrlPatcher};
