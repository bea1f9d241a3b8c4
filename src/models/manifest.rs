//! manifest.json fields relevant to package identity

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub manifest_version: u8,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,

    /// Base64 public key pinned by unpacked or self-hosted Chrome extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_specific_settings: Option<BrowserSpecificSettings>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub applications: Option<BrowserSpecificSettings>,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSpecificSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gecko: Option<GeckoSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeckoSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Manifest {
    /// Firefox add-on ID from `browser_specific_settings` or the older `applications` key.
    pub fn gecko_id(&self) -> Option<&str> {
        self.browser_specific_settings
            .as_ref()
            .or(self.applications.as_ref())
            .and_then(|s| s.gecko.as_ref())
            .and_then(|g| g.id.as_deref())
    }
}
