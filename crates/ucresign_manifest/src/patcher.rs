//! Manifest rewriting applied between verification and re-signing.

use thiserror::Error;

use crate::Manifest;

#[derive(Debug, Error)]
pub enum PatchError {
    /// Replacing an empty string would splice `to` between every character.
    #[error("Patch source prefix must not be empty")]
    EmptySource,
}

/// A single in-place rewrite step. Patchers run in declared order, each on
/// the output of the previous one.
pub trait Patcher: Send + Sync {
    fn patch(&self, manifest: &mut Manifest) -> Result<(), PatchError>;
}

/// Replaces every literal occurrence of `from` with `to` in the core URL and
/// in each plugin URL. No other field is touched, and a `url` that is not a
/// string is left as it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPatcher {
    from: String,
    to: String,
}

impl UrlPatcher {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Result<Self, PatchError> {
        let from = from.into();
        if from.is_empty() {
            return Err(PatchError::EmptySource);
        }
        Ok(Self { from, to: to.into() })
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    fn rewrite(&self, url: Option<&mut String>) {
        if let Some(u) = url
            && u.contains(&self.from)
        {
            *u = u.replace(&self.from, &self.to);
        }
    }
}

impl Patcher for UrlPatcher {
    fn patch(&self, manifest: &mut Manifest) -> Result<(), PatchError> {
        if let Some(core) = manifest.core.as_mut() {
            self.rewrite(core.url_mut());
        }
        for plugin in manifest.plugins.iter_mut().flat_map(|p| p.values_mut()) {
            self.rewrite(plugin.url_mut());
        }
        Ok(())
    }
}

/// Run `patchers` over `manifest` in order, stopping at the first failure.
pub fn apply_all(patchers: &[Box<dyn Patcher>], manifest: &mut Manifest) -> Result<(), PatchError> {
    patchers.iter().try_for_each(|p| p.patch(manifest))
}
