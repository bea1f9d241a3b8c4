//! CRX/XPI package viewer core
//!
//! Unwraps CRX2/CRX3 containers (including CRX nested in CRX) into their ZIP
//! payload, derives extension IDs from public keys, and reads the signer of
//! Mozilla-signed add-ons out of their COSE signature.

pub mod config;
pub mod error;
pub mod models;
pub mod parser;
pub mod packager;
pub mod signing;
pub mod store;
pub mod fetch;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use config::{DecodeOptions, FetchOptions, HeaderPolicy};
pub use error::{CborError, CrxError, DerError, FetchError, SignatureError};
pub use models::{ContainerFormat, DecodedPackage, DecodeWarning, PackageSummary};
pub use packager::{decode_container, decode_container_with, public_key_to_extension_id, ExtensionId};
pub use fetch::{load_package, PackageSource, Progress};

use anyhow::Result;
use models::SignatureInfo;
use packager::extractor::{key_matches_container, PackageArchive};
use serde::Serialize;

/// Everything known about a decoded package.
#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    #[serde(flatten)]
    pub summary: PackageSummary,
    pub file_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Firefox add-on ID declared by the manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gecko_id: Option<String>,
    /// Whether manifest.json's `key` agrees with the container key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_key_matches: Option<bool>,
    pub signature: Option<SignatureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_error: Option<String>,
}

/// Opens the payload of `package` and collects manifest and signer details.
pub fn inspect_package(package: &DecodedPackage) -> Result<PackageReport> {
    // 1. Container facts
    let summary = package.summary();

    // 2. Archive contents
    let mut archive = PackageArchive::open(package)?;
    let file_count = archive.entries().iter().filter(|e| !e.is_dir).count();

    // 3. Manifest; a broken manifest does not make the package unreadable
    let manifest = match archive.manifest() {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::warn!("Ignoring unreadable manifest.json: {:#}", e);
            None
        }
    };
    let manifest_key_matches = manifest
        .as_ref()
        .and_then(|m| key_matches_container(m, package));

    // 4. Signer
    let (signature, signature_error) = match signing::inspect_signature(&mut archive) {
        Ok(info) => (Some(info), None),
        Err(e) => {
            tracing::warn!("Failed to read add-on signature: {}", e);
            (None, Some(e.to_string()))
        }
    };

    Ok(PackageReport {
        summary,
        file_count,
        name: manifest.as_ref().map(|m| m.name.clone()),
        version: manifest.as_ref().map(|m| m.version.clone()),
        gecko_id: manifest.as_ref().and_then(|m| m.gecko_id()).map(str::to_string),
        manifest_key_matches,
        signature,
        signature_error,
    })
}
