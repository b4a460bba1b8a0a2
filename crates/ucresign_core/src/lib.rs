//! # ucresign_core
//!
//! Keeps a re-signed copy of an upstream update-center document.
//!
//! This crate provides:
//! - The [`UpdateCenter`] refresh coordinator
//! - Application configuration and assembly of sources, signer and patchers
//!
//! ## Example
//!
//! ```rust,ignore
//! use ucresign_core::UpdateCenter;
//!
//! let center = UpdateCenter::new(data_dir, timeout, source, signer, patchers);
//! match center.refresh(&cancel).await? {
//!     RefreshOutcome::Updated { metadata } => println!("published {metadata}"),
//!     _ => println!("up to date"),
//! }
//! ```

pub mod config;
mod error;
mod refresher;

pub use config::{AppConfig, PatchConfig, SignerConfig, SourceConfig, SourceHandle, SourceLocation};
pub use error::{ConfigError, RefreshError};
pub use refresher::{
    ArtifactPaths, RefreshOutcome, UPDATE_CENTER_HTML, UPDATE_CENTER_JSON, UpdateCenter,
};

#[cfg(test)]
pub mod test_utils;
