//! Package fetch adapter
//!
//! Turns a URL, an in-memory buffer or a file into bytes and hands them to
//! the container decoder. URL support needs the `net` feature.

use bytes::Bytes;
use std::path::PathBuf;

use crate::config::FetchOptions;
use crate::error::FetchError;
use crate::models::DecodedPackage;
use crate::packager::crx::decode_container_with;

#[derive(Debug, Clone)]
pub enum PackageSource {
    Url(String),
    Bytes(Bytes),
    File(PathBuf),
    /// Nothing was selected; not an error.
    None,
}

impl PackageSource {
    /// Interprets a command-line style argument as a URL or a file path.
    pub fn from_arg(arg: &str) -> Self {
        let lower = arg.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            PackageSource::Url(arg.to_string())
        } else if arg.is_empty() {
            PackageSource::None
        } else {
            PackageSource::File(PathBuf::from(arg))
        }
    }
}

/// Download progress. `total` is unknown when the server sends no length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub loaded: u64,
    pub total: Option<u64>,
}

/// Obtains the bytes of `source` and decodes them.
///
/// Resolves exactly once. Dropping the future aborts an in-flight download.
/// File sources are read synchronously on the calling task.
pub async fn load_package(
    source: PackageSource,
    options: &FetchOptions,
    progress: Option<&(dyn Fn(Progress) + Send + Sync)>,
) -> Result<Option<DecodedPackage>, FetchError> {
    let raw = match source {
        PackageSource::None => return Ok(None),
        PackageSource::Bytes(bytes) => bytes,
        PackageSource::File(path) => {
            let content = std::fs::read(&path).map_err(|source| FetchError::Io {
                path: path.display().to_string(),
                source,
            })?;
            Bytes::from(content)
        }
        PackageSource::Url(url) => fetch_url(&url, options, progress).await?,
    };

    if raw.is_empty() {
        return Err(FetchError::EmptyResponse);
    }
    tracing::debug!(size = raw.len(), "Decoding package");
    let package = decode_container_with(raw, &options.decode)?;
    Ok(Some(package))
}

#[cfg(feature = "net")]
async fn fetch_url(
    url: &str,
    options: &FetchOptions,
    progress: Option<&(dyn Fn(Progress) + Send + Sync)>,
) -> Result<Bytes, FetchError> {
    use futures::StreamExt;

    let url = crate::store::resolve_download_url(url, &options.chrome_version);
    tracing::debug!(%url, "Fetching package");

    let client = reqwest::Client::builder()
        .user_agent(&options.user_agent)
        .timeout(options.timeout)
        .build()?;
    let response = client.get(&url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Network(format!("HTTP {} for {}", status, url)));
    }

    let total = response.content_length();
    let mut buffer = Vec::with_capacity(download_capacity(total));
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buffer.extend_from_slice(&chunk);
        if let Some(report) = progress {
            report(Progress {
                loaded: buffer.len() as u64,
                total,
            });
        }
    }

    if buffer.is_empty() {
        return Err(FetchError::EmptyResponse);
    }
    tracing::debug!(size = buffer.len(), "Fetched package");
    Ok(Bytes::from(buffer))
}

/// Content-Length is server controlled, so it only seeds a capped allocation.
#[cfg(any(feature = "net", test))]
fn download_capacity(total: Option<u64>) -> usize {
    crate::parser::primitives::capacity_hint(total.unwrap_or(0))
}

#[cfg(not(feature = "net"))]
async fn fetch_url(
    url: &str,
    _options: &FetchOptions,
    _progress: Option<&(dyn Fn(Progress) + Send + Sync)>,
) -> Result<Bytes, FetchError> {
    Err(FetchError::Network(format!(
        "cannot fetch {}: built without the net feature",
        url
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_arg() {
        assert!(matches!(PackageSource::from_arg("https://example.com/a.crx"), PackageSource::Url(_)));
        assert!(matches!(PackageSource::from_arg("HTTP://example.com/a.crx"), PackageSource::Url(_)));
        assert!(matches!(PackageSource::from_arg("./a.crx"), PackageSource::File(_)));
        assert!(matches!(PackageSource::from_arg(""), PackageSource::None));
    }

    #[test]
    fn test_download_capacity_ignores_huge_content_length() {
        assert_eq!(download_capacity(None), 0);
        assert_eq!(download_capacity(Some(1024)), 1024);
        assert_eq!(
            download_capacity(Some(u64::MAX)),
            crate::parser::primitives::MAX_CAPACITY_HINT as usize
        );
    }
}
