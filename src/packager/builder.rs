//! Writing decoded packages to disk

use crate::models::{ContainerFormat, DecodedPackage};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Output names for the extracted ZIP and, when kept, the original container.
pub fn default_file_names(stem: &str, package: &DecodedPackage) -> (PathBuf, Option<PathBuf>) {
    let zip = PathBuf::from(format!("{}.zip", stem));
    let original = package.original.as_ref().map(|_| {
        let extension = match package.format {
            ContainerFormat::Zip => "xpi",
            ContainerFormat::Crx2 | ContainerFormat::Crx3 => "crx",
        };
        PathBuf::from(format!("{}.{}", stem, extension))
    });
    (zip, original)
}

fn write_bytes(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Write the extracted ZIP payload
pub fn write_payload(package: &DecodedPackage, path: &Path) -> Result<()> {
    write_bytes(path, &package.payload)
}

/// Write the untouched input. Returns false when the package kept no
/// original bytes (nothing was unwrapped beyond the outer layer).
pub fn write_original(package: &DecodedPackage, path: &Path) -> Result<bool> {
    match &package.original {
        Some(original) => {
            write_bytes(path, original)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ZIP_MIME_TYPE;
    use bytes::Bytes;
    use tempfile::TempDir;

    fn package(original: Option<&'static [u8]>) -> DecodedPackage {
        DecodedPackage {
            format: ContainerFormat::Crx3,
            payload: Bytes::from_static(b"PK\x05\x06"),
            mime_type: ZIP_MIME_TYPE,
            public_key: None,
            original: original.map(Bytes::from_static),
            nesting_depth: usize::from(original.is_some()),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_write_payload_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out/nested/ext.zip");
        write_payload(&package(None), &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"PK\x05\x06");
    }

    #[test]
    fn test_write_original_only_when_kept() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ext.crx");
        assert!(!write_original(&package(None), &path).unwrap());
        assert!(!path.exists());

        assert!(write_original(&package(Some(b"Cr24...")), &path).unwrap());
        assert_eq!(fs::read(&path).unwrap(), b"Cr24...");
    }

    #[test]
    fn test_default_file_names() {
        assert_eq!(default_file_names("ext", &package(None)), (PathBuf::from("ext.zip"), None));
        assert_eq!(
            default_file_names("ext", &package(Some(b"Cr24"))),
            (PathBuf::from("ext.zip"), Some(PathBuf::from("ext.crx")))
        );
    }
}
