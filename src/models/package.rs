//! Container classification and decoded package representation

use bytes::Bytes;
use serde::Serialize;
use std::fmt;

use crate::packager::identity::{extension_id_from_key, ExtensionId};

pub const ZIP_MIME_TYPE: &str = "application/zip";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Zip,
    Crx2,
    Crx3,
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerFormat::Zip => write!(f, "ZIP"),
            ContainerFormat::Crx2 => write!(f, "CRX2"),
            ContainerFormat::Crx3 => write!(f, "CRX3"),
        }
    }
}

/// Result of reading one container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub format: ContainerFormat,
    /// Where the inner ZIP starts; never past the end of the input.
    pub payload_offset: usize,
    /// Raw public key, present for CRX2 and CRX3.
    pub public_key: Option<Vec<u8>>,
}

/// Non-fatal anomalies noticed while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// Input had no ZIP/CRX magic but an end of central directory was found.
    ZipWithoutMagic,
    /// Bytes at the payload offset do not look like a ZIP.
    PayloadNotZip { offset: usize },
    /// CRX3 header field that is neither signed data nor a key proof.
    UnknownHeaderField { key: u32, length: usize },
    /// signed_header_data did not hold exactly one 16-byte crx_id.
    MalformedSignedHeaderData,
    /// signed_header_data occurred more than once; the last one wins.
    DuplicateSignedHeaderData,
    /// AsymmetricKeyProof without a public_key, or with unknown fields.
    MalformedKeyProof { key: u32 },
    /// A nested CRX reported a different key than its container.
    NestedKeyMismatch { depth: usize },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::ZipWithoutMagic => {
                write!(f, "Input is not a CRX file, but possibly a ZIP file")
            }
            DecodeWarning::PayloadNotZip { offset } => {
                write!(f, "No ZIP signature at payload offset {}", offset)
            }
            DecodeWarning::UnknownHeaderField { key, length } => {
                write!(f, "Skipped unknown CRX3 header field {} ({} bytes)", key, length)
            }
            DecodeWarning::MalformedSignedHeaderData => {
                write!(f, "Unexpected shape of signed_header_data")
            }
            DecodeWarning::DuplicateSignedHeaderData => {
                write!(f, "signed_header_data appears more than once")
            }
            DecodeWarning::MalformedKeyProof { key } => {
                write!(f, "Unexpected shape of key proof field {}", key)
            }
            DecodeWarning::NestedKeyMismatch { depth } => write!(
                f,
                "Nested CRX at depth {} has a different public key; keeping the outer key",
                depth
            ),
        }
    }
}

/// The decoded payload plus identity information.
#[derive(Debug, Clone)]
pub struct DecodedPackage {
    /// Format of the outermost container.
    pub format: ContainerFormat,
    /// The inner ZIP archive.
    pub payload: Bytes,
    pub mime_type: &'static str,
    /// Base64 public key of the outermost CRX.
    pub public_key: Option<String>,
    /// The untouched input, kept only when a nested CRX was unwrapped.
    pub original: Option<Bytes>,
    /// Number of nested CRX layers below the outer one.
    pub nesting_depth: usize,
    pub warnings: Vec<DecodeWarning>,
}

impl DecodedPackage {
    pub fn is_nested(&self) -> bool {
        self.original.is_some()
    }

    pub fn public_key_bytes(&self) -> Option<Vec<u8>> {
        use base64::Engine;
        self.public_key
            .as_deref()
            .and_then(|key| base64::engine::general_purpose::STANDARD.decode(key).ok())
    }

    pub fn extension_id(&self) -> Option<ExtensionId> {
        self.public_key_bytes().map(|key| extension_id_from_key(&key))
    }

    pub fn summary(&self) -> PackageSummary {
        PackageSummary {
            format: self.format,
            payload_size: self.payload.len(),
            original_size: self.original.as_ref().map(Bytes::len),
            public_key: self.public_key.clone(),
            extension_id: self.extension_id().map(|id| id.to_string()),
            nesting_depth: self.nesting_depth,
            warnings: self.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Serializable overview of a [`DecodedPackage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub format: ContainerFormat,
    pub payload_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension_id: Option<String>,
    pub nesting_depth: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
