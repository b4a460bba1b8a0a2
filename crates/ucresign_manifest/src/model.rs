//! Update-center document types.
//!
//! Only `core.url` and each plugin `url` are ever rewritten. Entries keep
//! their fields verbatim, explicit `null`s and odd types included, so
//! decoding and re-encoding a document never changes bytes the upstream
//! signature covers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The unsigned update-center manifest.
///
/// `core` and `plugins` are typed only when they hold objects. Any other
/// shape, `null` included, stays in `extra` under its own key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Manifest {
    pub core: Option<CoreEntry>,

    /// Plugin entries keyed by plugin name.
    pub plugins: Option<BTreeMap<String, PluginEntry>>,

    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for Manifest {
    fn from(mut extra: Map<String, Value>) -> Self {
        let core = match extra.remove("core") {
            Some(Value::Object(fields)) => Some(CoreEntry { fields }),
            Some(other) => {
                extra.insert("core".to_string(), other);
                None
            }
            None => None,
        };

        let plugins = match extra.remove("plugins") {
            Some(Value::Object(entries)) if entries.values().all(Value::is_object) => Some(
                entries
                    .into_iter()
                    .filter_map(|(name, entry)| match entry {
                        Value::Object(fields) => Some((name, PluginEntry { fields })),
                        _ => None,
                    })
                    .collect(),
            ),
            Some(other) => {
                extra.insert("plugins".to_string(), other);
                None
            }
            None => None,
        };

        Self { core, plugins, extra }
    }
}

impl From<Manifest> for Map<String, Value> {
    fn from(manifest: Manifest) -> Self {
        let mut map = manifest.extra;
        if let Some(core) = manifest.core {
            map.insert("core".to_string(), Value::Object(core.fields));
        }
        if let Some(plugins) = manifest.plugins {
            let entries = plugins
                .into_iter()
                .map(|(name, entry)| (name, Value::Object(entry.fields)))
                .collect();
            map.insert("plugins".to_string(), Value::Object(entries));
        }
        map
    }
}

impl Manifest {
    pub fn update_center_version(&self) -> Option<&str> {
        self.extra.get("updateCenterVersion").and_then(Value::as_str)
    }

    pub fn deprecations(&self) -> Option<&Value> {
        self.extra.get("deprecations")
    }

    pub fn warnings(&self) -> Option<&Value> {
        self.extra.get("warnings")
    }

    /// Number of plugin entries.
    pub fn plugin_count(&self) -> usize {
        self.plugins.as_ref().map_or(0, BTreeMap::len)
    }

    /// Core URL followed by every plugin URL, in key order.
    pub fn download_urls(&self) -> impl Iterator<Item = &str> {
        let core = self.core.as_ref().and_then(CoreEntry::url);
        let plugins = self
            .plugins
            .iter()
            .flat_map(|p| p.values())
            .filter_map(PluginEntry::url);
        core.into_iter().chain(plugins)
    }
}

fn string_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

fn string_field_mut<'a>(fields: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut String> {
    match fields.get_mut(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// The core (war) release entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoreEntry {
    pub fields: Map<String, Value>,
}

impl CoreEntry {
    pub fn with_url(url: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("url".to_string(), Value::String(url.into()));
        Self { fields }
    }

    /// Download URL, when it is a string.
    pub fn url(&self) -> Option<&str> {
        string_field(&self.fields, "url")
    }

    pub fn url_mut(&mut self) -> Option<&mut String> {
        string_field_mut(&mut self.fields, "url")
    }

    pub fn version(&self) -> Option<&str> {
        string_field(&self.fields, "version")
    }
}

/// A single plugin release entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginEntry {
    pub fields: Map<String, Value>,
}

impl PluginEntry {
    pub fn with_url(url: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("url".to_string(), Value::String(url.into()));
        Self { fields }
    }

    /// Download URL, when it is a string.
    pub fn url(&self) -> Option<&str> {
        string_field(&self.fields, "url")
    }

    pub fn url_mut(&mut self) -> Option<&mut String> {
        string_field_mut(&mut self.fields, "url")
    }

    pub fn version(&self) -> Option<&str> {
        string_field(&self.fields, "version")
    }

    pub fn required_core(&self) -> Option<&str> {
        string_field(&self.fields, "requiredCore")
    }

    pub fn dependencies(&self) -> Option<&Vec<Value>> {
        self.fields.get("dependencies").and_then(Value::as_array)
    }
}

/// Detached signature block of an update-center document.
///
/// The hex/base64 split is fixed by the consuming clients: SHA-1 digest in
/// hex with a base64 signature, SHA-512 digest in base64 with a hex
/// signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Base64 DER certificates, signer first.
    #[serde(default)]
    pub certificates: Vec<String>,

    #[serde(rename = "correct_digest", default)]
    pub digest: String,

    #[serde(rename = "correct_digest512", default)]
    pub digest512: String,

    #[serde(rename = "correct_signature", default)]
    pub signature: String,

    #[serde(rename = "correct_signature512", default)]
    pub signature512: String,
}

/// A manifest together with its signature block, the unit that is published.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignedManifest {
    #[serde(flatten)]
    pub manifest: Manifest,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl SignedManifest {
    pub fn new(manifest: Manifest, signature: Signature) -> Self {
        Self {
            manifest,
            signature: Some(signature),
        }
    }
}
