//! Manifest parsing functionality

use crate::models::Manifest;
use anyhow::{Context, Result};

/// Parse manifest.json from bytes
pub fn parse_manifest(content: &[u8]) -> Result<Manifest> {
    // Some manifests start with a UTF-8 BOM
    let content = content.strip_prefix(b"\xef\xbb\xbf").unwrap_or(content);
    let content_str = std::str::from_utf8(content)
        .context("Invalid UTF-8 in manifest.json")?;

    // Chrome tolerates comments in manifest.json, so parse as json5
    let manifest: Manifest = json5::from_str(content_str)
        .context("Failed to parse manifest.json")?;

    Ok(manifest)
}
