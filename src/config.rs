//! Decoder and fetch configuration

use std::time::Duration;

/// How the CRX3 header scan reacts to fields it does not expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderPolicy {
    /// Record a warning and keep scanning. Store-produced CRX3 files carry
    /// extra fields, so this is the default.
    #[default]
    Lenient,
    /// Fail on the first unexpected field or shape.
    Strict,
}

#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub header_policy: HeaderPolicy,
    /// Nested CRX layers allowed below the outer container.
    pub max_nesting_depth: usize,
    /// Trailing bytes searched for a ZIP end of central directory when the
    /// input has no recognised magic.
    pub eocd_scan_window: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            header_policy: HeaderPolicy::Lenient,
            max_nesting_depth: 10,
            eocd_scan_window: 64 * 1024,
        }
    }
}

impl DecodeOptions {
    pub fn strict() -> Self {
        Self {
            header_policy: HeaderPolicy::Strict,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    pub timeout: Duration,
    /// Sent as `prodversion` to the Chrome update service, which refuses to
    /// serve CRX files to very old versions.
    pub chrome_version: String,
    pub decode: DecodeOptions,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: format!("crxviewer/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(60),
            chrome_version: "130.0.0.0".to_string(),
            decode: DecodeOptions::default(),
        }
    }
}
