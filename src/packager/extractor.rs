//! Listing and reading files inside a decoded package

use crate::models::{DecodedPackage, Manifest};
use crate::packager::identity::{extension_id_from_key, ExtensionId};
use crate::parser::parse_manifest;
use crate::parser::primitives::capacity_hint;
use anyhow::{Context, Result};
use base64::Engine;
use bytes::Bytes;
use serde::Serialize;
use std::io::{Cursor, Read};
use zip::ZipArchive;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub path: String,
    pub size: u64,
    pub compressed_size: u64,
    pub is_dir: bool,
}

/// The ZIP payload of a package, opened for browsing.
pub struct PackageArchive {
    archive: ZipArchive<Cursor<Bytes>>,
    entries: Vec<ArchiveEntry>,
}

impl std::fmt::Debug for PackageArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageArchive")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl PackageArchive {
    pub fn open(package: &DecodedPackage) -> Result<Self> {
        Self::from_zip(package.payload.clone())
    }

    pub fn from_zip(payload: Bytes) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(payload))
            .context("Failed to read ZIP archive")?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)
                .context("Failed to read file from archive")?;
            entries.push(ArchiveEntry {
                path: file.name().to_string(),
                size: file.size(),
                compressed_size: file.compressed_size(),
                is_dir: file.is_dir(),
            });
        }

        Ok(Self { archive, entries })
    }

    /// Entries in central directory order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    pub fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(path)
            .with_context(|| format!("{} not found in archive", path))?;
        let mut content = Vec::with_capacity(capacity_hint(file.size()));
        file.read_to_end(&mut content)
            .with_context(|| format!("Failed to read {}", path))?;
        Ok(content)
    }

    /// Parsed manifest.json at the archive root, if there is one.
    pub fn manifest(&mut self) -> Result<Option<Manifest>> {
        if !self.contains("manifest.json") {
            return Ok(None);
        }
        let content = self.read("manifest.json")?;
        parse_manifest(&content).map(Some)
    }
}

/// Extension ID pinned by the manifest `key`, if present and decodable.
pub fn manifest_extension_id(manifest: &Manifest) -> Option<ExtensionId> {
    let key = manifest.key.as_deref()?;
    let raw = base64::engine::general_purpose::STANDARD
        .decode(key.trim())
        .ok()?;
    Some(extension_id_from_key(&raw))
}

/// Whether the manifest `key` names the same extension as the container key.
/// `None` when either side has no key.
pub fn key_matches_container(manifest: &Manifest, package: &DecodedPackage) -> Option<bool> {
    Some(manifest_extension_id(manifest)? == package.extension_id()?)
}
