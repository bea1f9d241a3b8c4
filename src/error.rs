//! Error types for every decoding layer

use thiserror::Error;

/// Failures of the DER/ASN.1 reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerError {
    #[error("Malformed DER encoding: {0}")]
    MalformedEncoding(&'static str),

    #[error("Unsupported DirectoryString type (tag {0})")]
    UnsupportedStringType(u32),

    #[error("Unsupported character 0x{0:02x} in TeletexString")]
    UnsupportedCharacter(u8),

    #[error("Certificate subject not found")]
    SubjectNotFound,
}

/// Failures of the CBOR/COSE reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CborError {
    #[error("Truncated CBOR buffer: needed {needed} bytes, {available} available")]
    TruncatedBuffer { needed: usize, available: usize },

    #[error("Unsupported CBOR encoding: {0}")]
    UnsupportedEncoding(&'static str),

    #[error("Reserved CBOR additional info {0}")]
    ReservedAdditionalInfo(u8),

    #[error("Unsupported CBOR simple value {0}")]
    UnsupportedSimpleType(u8),

    #[error("Malformed CBOR encoding: {0}")]
    MalformedEncoding(&'static str),

    #[error("Unexpected CBOR major type: expected {expected}, got {actual}")]
    UnexpectedType { expected: u8, actual: u8 },

    #[error("Unexpected CBOR value: expected {expected}, got {actual}")]
    UnexpectedValue { expected: u64, actual: u64 },

    #[error("Signing certificate not found in COSE envelope")]
    CertificateNotFound,
}

/// Failures of the CRX container decoder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrxError {
    #[error("Invalid header: does not start with Cr24 and holds no ZIP end of central directory")]
    InvalidHeader,

    #[error("Unsupported CRX version {0}")]
    UnsupportedVersion(u32),

    #[error("Truncated buffer: {what} needs {needed} bytes, {available} available")]
    TruncatedBuffer {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("No public key found in CRX3 header")]
    PublicKeyNotFound,

    #[error("No crx_id found in CRX3 signed header data")]
    CrxIdNotFound,

    #[error("None of the {candidates} public keys matches the crx_id")]
    PublicKeyMismatch { candidates: usize },

    #[error("Unexpected CRX3 header field with key {key}")]
    UnexpectedHeaderField { key: u32 },

    #[error("Malformed CRX3 header: {0}")]
    MalformedHeader(&'static str),

    #[error("CRX nesting exceeds {limit} levels")]
    TooDeeplyNested { limit: usize },

    #[error("Invalid base64 public key: {0}")]
    InvalidPublicKey(String),
}

/// Failures while inspecting the signature of an unpacked add-on.
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Failed to read signature file: {0}")]
    Archive(#[from] anyhow::Error),

    #[error("COSE signature: {0}")]
    Cose(#[from] CborError),

    #[error("Signing certificate: {0}")]
    Certificate(#[from] DerError),
}

/// Failures surfaced by the package fetch adapter.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Empty response")]
    EmptyResponse,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode package: {0}")]
    Decode(#[from] CrxError),
}

#[cfg(feature = "net")]
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
