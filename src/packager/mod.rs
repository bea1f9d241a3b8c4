//! Package unwrapping, identity, browsing and output

pub mod crx;
pub mod identity;
pub mod extractor;
pub mod builder;

pub use crx::{decode_container, decode_container_with, read_container_header};
pub use identity::{extension_id_from_key, public_key_to_extension_id, ExtensionId};
pub use extractor::{ArchiveEntry, PackageArchive};

use crate::config::DecodeOptions;
use crate::models::DecodedPackage;
use anyhow::{Context, Result};
use bytes::Bytes;
use std::path::Path;

/// Read and decode a package file from disk
pub fn load_package_file(path: &Path, options: &DecodeOptions) -> Result<DecodedPackage> {
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    decode_container_with(Bytes::from(content), options)
        .with_context(|| format!("Failed to decode {}", path.display()))
}
