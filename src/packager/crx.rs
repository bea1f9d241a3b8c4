//! CRX container decoding
//!
//! Layout of the two container versions (all integers little-endian):
//!
//! ```text
//! CRX2: "Cr24" | 2u32 | key_len u32 | sig_len u32 | key | signature | ZIP
//! CRX3: "Cr24" | 3u32 | header_len u32 | CrxFileHeader (protobuf) | ZIP
//! ```
//!
//! Plain ZIP/XPI input passes through untouched.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use super::identity::crx_id_of;
use crate::config::{DecodeOptions, HeaderPolicy};
use crate::error::CrxError;
use crate::models::{ContainerFormat, ContainerHeader, DecodeWarning, DecodedPackage, ZIP_MIME_TYPE};
use crate::parser::primitives::{read_fixed_le, read_proto_varint};

pub const CRX_MAGIC: &[u8; 4] = b"Cr24";
pub const ZIP_LOCAL_FILE_MAGIC: &[u8; 4] = b"PK\x03\x04";
pub const ZIP_EOCD_MAGIC: &[u8; 4] = b"PK\x05\x06";

const CRX2_HEADER_SIZE: usize = 16;
const CRX3_HEADER_SIZE: usize = 12;

// CrxFileHeader keys (field number << 3 | wire type 2)
const KEY_SHA256_WITH_RSA: u32 = 0x12;
const KEY_SHA256_WITH_ECDSA: u32 = 0x1a;
const KEY_SIGNED_HEADER_DATA: u32 = 80002;
// AsymmetricKeyProof keys
const KEY_PROOF_PUBLIC_KEY: u32 = 0x0a;
const KEY_PROOF_SIGNATURE: u32 = 0x12;
// SignedData keys
const KEY_CRX_ID: u32 = 0x0a;
const CRX_ID_LEN: usize = 16;

/// Decodes with [`DecodeOptions::default`].
pub fn decode_container(raw: Bytes) -> Result<DecodedPackage, CrxError> {
    decode_container_with(raw, &DecodeOptions::default())
}

/// Strips CRX headers until the inner ZIP is reached.
///
/// Nested CRX3 layers are unwrapped in a loop bounded by
/// `options.max_nesting_depth`. The outermost public key is the one reported.
pub fn decode_container_with(raw: Bytes, options: &DecodeOptions) -> Result<DecodedPackage, CrxError> {
    let mut warnings = Vec::new();
    let mut current = raw.clone();
    let mut outer: Option<(ContainerFormat, Option<Vec<u8>>)> = None;

    for depth in 0..=options.max_nesting_depth {
        let header = read_container_header(&current, options, &mut warnings)?;

        match &outer {
            None => outer = Some((header.format, header.public_key.clone())),
            Some((_, outer_key)) => {
                if header.public_key.is_some() && header.public_key != *outer_key {
                    tracing::warn!(depth, "Nested CRX public key differs from the outer key");
                    warnings.push(DecodeWarning::NestedKeyMismatch { depth });
                }
            }
        }

        let payload = current.slice(header.payload_offset..);
        if header.format == ContainerFormat::Crx3 && payload.starts_with(CRX_MAGIC) {
            tracing::debug!(depth, offset = header.payload_offset, "Found nested CRX");
            current = payload;
            continue;
        }

        let (format, public_key) = outer.unwrap_or((header.format, None));
        return Ok(DecodedPackage {
            format,
            payload,
            mime_type: ZIP_MIME_TYPE,
            public_key: public_key.map(|key| STANDARD.encode(key)),
            original: (depth > 0).then_some(raw),
            nesting_depth: depth,
            warnings,
        });
    }

    Err(CrxError::TooDeeplyNested {
        limit: options.max_nesting_depth,
    })
}

fn read_u32(bytes: &[u8], offset: usize, what: &'static str) -> Result<u32, CrxError> {
    read_fixed_le(bytes, offset, 4).ok_or(CrxError::TruncatedBuffer {
        what,
        needed: offset + 4,
        available: bytes.len(),
    })
}

fn payload_end(start: usize, length: u32, available: usize, what: &'static str) -> Result<usize, CrxError> {
    let end = start.saturating_add(length as usize);
    if end > available {
        return Err(CrxError::TruncatedBuffer {
            what,
            needed: end,
            available,
        });
    }
    Ok(end)
}

/// Searches the trailing window of `bytes` for a ZIP end of central directory.
pub fn has_zip_eocd(bytes: &[u8], window: usize) -> bool {
    let start = bytes.len().saturating_sub(window);
    bytes[start..].windows(ZIP_EOCD_MAGIC.len()).any(|w| w == ZIP_EOCD_MAGIC)
}

fn looks_like_zip(payload: &[u8]) -> bool {
    payload.starts_with(ZIP_LOCAL_FILE_MAGIC) || payload.starts_with(ZIP_EOCD_MAGIC)
}

/// Classifies one container layer and locates its payload.
pub fn read_container_header(
    bytes: &[u8],
    options: &DecodeOptions,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<ContainerHeader, CrxError> {
    if bytes.starts_with(ZIP_LOCAL_FILE_MAGIC) {
        return Ok(ContainerHeader {
            format: ContainerFormat::Zip,
            payload_offset: 0,
            public_key: None,
        });
    }

    if !bytes.starts_with(CRX_MAGIC) {
        if has_zip_eocd(bytes, options.eocd_scan_window) {
            tracing::warn!("Input is not a CRX file, but possibly a ZIP file");
            warnings.push(DecodeWarning::ZipWithoutMagic);
            return Ok(ContainerHeader {
                format: ContainerFormat::Zip,
                payload_offset: 0,
                public_key: None,
            });
        }
        return Err(CrxError::InvalidHeader);
    }

    let version = read_u32(bytes, 4, "CRX version")?;
    let header = match version {
        2 => read_crx2_header(bytes)?,
        3 => read_crx3_header(bytes, options.header_policy, warnings)?,
        other => return Err(CrxError::UnsupportedVersion(other)),
    };

    let payload = &bytes[header.payload_offset..];
    if !looks_like_zip(payload) && !payload.starts_with(CRX_MAGIC) {
        tracing::warn!(offset = header.payload_offset, "Payload does not start with a ZIP signature");
        warnings.push(DecodeWarning::PayloadNotZip {
            offset: header.payload_offset,
        });
    }
    Ok(header)
}

fn read_crx2_header(bytes: &[u8]) -> Result<ContainerHeader, CrxError> {
    let key_len = read_u32(bytes, 8, "CRX2 public key length")?;
    let sig_len = read_u32(bytes, 12, "CRX2 signature length")?;
    let key_end = payload_end(CRX2_HEADER_SIZE, key_len, bytes.len(), "CRX2 public key")?;
    let payload_offset = payload_end(key_end, sig_len, bytes.len(), "CRX2 signature")?;
    tracing::debug!(key_len, sig_len, payload_offset, "Read CRX2 header");

    Ok(ContainerHeader {
        format: ContainerFormat::Crx2,
        payload_offset,
        public_key: Some(bytes[CRX2_HEADER_SIZE..key_end].to_vec()),
    })
}

fn read_crx3_header(
    bytes: &[u8],
    policy: HeaderPolicy,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<ContainerHeader, CrxError> {
    let header_len = read_u32(bytes, 8, "CRX3 header length")?;
    let payload_offset = payload_end(CRX3_HEADER_SIZE, header_len, bytes.len(), "CRX3 header")?;
    tracing::debug!(header_len, payload_offset, "Read CRX3 header");

    let public_key = find_crx3_public_key(&bytes[CRX3_HEADER_SIZE..payload_offset], policy, warnings)?;
    Ok(ContainerHeader {
        format: ContainerFormat::Crx3,
        payload_offset,
        public_key: Some(public_key),
    })
}

/// Iterates `(key, value)` pairs of length-delimited protobuf fields.
///
/// Every field in a CrxFileHeader is length-delimited, so the wire type is
/// not inspected.
struct LengthDelimitedFields<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> LengthDelimitedFields<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }
}

impl<'a> Iterator for LengthDelimitedFields<'a> {
    type Item = Result<(u32, &'a [u8]), CrxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }
        let (key, offset) = read_proto_varint(self.data, self.offset);
        let (length, start) = read_proto_varint(self.data, offset);
        match payload_end(start, length, self.data.len(), "CRX3 header field") {
            Ok(end) => {
                self.offset = end;
                Some(Ok((key, &self.data[start..end])))
            }
            Err(e) => {
                self.offset = self.data.len();
                Some(Err(e))
            }
        }
    }
}

fn tolerate(
    policy: HeaderPolicy,
    warnings: &mut Vec<DecodeWarning>,
    warning: DecodeWarning,
    error: CrxError,
) -> Result<(), CrxError> {
    match policy {
        HeaderPolicy::Strict => Err(error),
        HeaderPolicy::Lenient => {
            tracing::warn!("{}", warning);
            warnings.push(warning);
            Ok(())
        }
    }
}

/// Extracts `crx_id` from SignedData, which should hold exactly that field.
fn parse_signed_header_data(
    data: &[u8],
    policy: HeaderPolicy,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Option<[u8; CRX_ID_LEN]>, CrxError> {
    let mut crx_id = None;
    let mut well_formed = true;
    for field in LengthDelimitedFields::new(data) {
        match field {
            Ok((KEY_CRX_ID, value)) if value.len() == CRX_ID_LEN && crx_id.is_none() => {
                let mut id = [0u8; CRX_ID_LEN];
                id.copy_from_slice(value);
                crx_id = Some(id);
            }
            Ok(_) => well_formed = false,
            Err(_) => {
                well_formed = false;
                break;
            }
        }
    }
    if !well_formed || crx_id.is_none() {
        tolerate(
            policy,
            warnings,
            DecodeWarning::MalformedSignedHeaderData,
            CrxError::MalformedHeader("signed_header_data"),
        )?;
    }
    Ok(crx_id)
}

/// Returns the public key of an AsymmetricKeyProof.
fn parse_key_proof(
    key: u32,
    data: &[u8],
    policy: HeaderPolicy,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Option<Vec<u8>>, CrxError> {
    let mut public_key = None;
    let mut well_formed = true;
    for field in LengthDelimitedFields::new(data) {
        match field {
            Ok((KEY_PROOF_SIGNATURE, _)) => {}
            Ok((KEY_PROOF_PUBLIC_KEY, value)) if public_key.is_none() => {
                public_key = Some(value.to_vec());
            }
            Ok(_) => well_formed = false,
            Err(_) => {
                well_formed = false;
                break;
            }
        }
    }
    if !well_formed || public_key.is_none() {
        tolerate(
            policy,
            warnings,
            DecodeWarning::MalformedKeyProof { key },
            CrxError::MalformedHeader("AsymmetricKeyProof"),
        )?;
    }
    Ok(public_key)
}

/// Scans a CrxFileHeader for the public key whose hash prefix is the crx_id.
///
/// This is a protobuf-lite scan rather than a full decoder: only the fields
/// needed for identity are interpreted and everything else is skipped.
pub fn find_crx3_public_key(
    header: &[u8],
    policy: HeaderPolicy,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Vec<u8>, CrxError> {
    let mut candidates: Vec<Vec<u8>> = Vec::new();
    let mut crx_id = None;

    for field in LengthDelimitedFields::new(header) {
        let (key, value) = field?;
        match key {
            KEY_SIGNED_HEADER_DATA => {
                if crx_id.is_some() {
                    tolerate(
                        policy,
                        warnings,
                        DecodeWarning::DuplicateSignedHeaderData,
                        CrxError::MalformedHeader("duplicate signed_header_data"),
                    )?;
                }
                if let Some(id) = parse_signed_header_data(value, policy, warnings)? {
                    crx_id = Some(id);
                }
            }
            KEY_SHA256_WITH_RSA | KEY_SHA256_WITH_ECDSA => {
                if let Some(public_key) = parse_key_proof(key, value, policy, warnings)? {
                    candidates.push(public_key);
                }
            }
            _ => {
                tracing::debug!(key, length = value.len(), "Skipping CRX3 header field");
                tolerate(
                    policy,
                    warnings,
                    DecodeWarning::UnknownHeaderField {
                        key,
                        length: value.len(),
                    },
                    CrxError::UnexpectedHeaderField { key },
                )?;
            }
        }
    }

    if candidates.is_empty() {
        return Err(CrxError::PublicKeyNotFound);
    }
    let crx_id = crx_id.ok_or(CrxError::CrxIdNotFound)?;

    let count = candidates.len();
    candidates
        .into_iter()
        .find(|key| crx_id_of(key) == crx_id)
        .ok_or(CrxError::PublicKeyMismatch { candidates: count })
}
