//! Extension IDs derived from public keys

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::CrxError;

/// A 32-character `[a-p]` extension identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ExtensionId(String);

impl ExtensionId {
    pub const LEN: usize = 32;

    /// Validates an identifier; uppercase input is accepted and lowercased.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.to_ascii_lowercase();
        let valid = s.len() == Self::LEN && s.bytes().all(|b| (b'a'..=b'p').contains(&b));
        valid.then_some(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExtensionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("'{}' is not a 32-character [a-p] extension ID", s))
    }
}

/// First 128 bits of SHA-256, the form a CRX3 header stores as `crx_id`.
pub fn crx_id_of(public_key: &[u8]) -> [u8; 16] {
    let digest = Sha256::digest(public_key);
    let mut id = [0u8; 16];
    id.copy_from_slice(&digest[..16]);
    id
}

/// Maps each nibble of the first 16 hash bytes onto `'a' + nibble`.
pub fn extension_id_from_key(public_key: &[u8]) -> ExtensionId {
    let id = crx_id_of(public_key)
        .iter()
        .flat_map(|b| [b >> 4, b & 0x0f])
        .map(|nibble| char::from(b'a' + nibble))
        .collect();
    ExtensionId(id)
}

pub fn public_key_to_extension_id(base64_public_key: &str) -> Result<ExtensionId, CrxError> {
    let key = STANDARD
        .decode(base64_public_key.trim())
        .map_err(|e| CrxError::InvalidPublicKey(e.to_string()))?;
    Ok(extension_id_from_key(&key))
}
