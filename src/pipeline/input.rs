//! Input resolution: normalise a user-supplied path or URL to document
//! bytes plus a MIME type.
//!
//! Library callers that already hold bytes (an upload handler, a camera
//! capture) skip this module entirely and call the orchestrator directly.
//! The CLI and the [`crate::orchestrator::analyze_path`] convenience go
//! through here: the file is read (or downloaded), and the MIME type is
//! sniffed from magic bytes first, the file extension second. Sniffing from
//! content means a mislabelled `.pdf` that is really a JPEG is declared as
//! what it is, and the allow-list check downstream sees the truth.

use crate::error::AnalysisError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Document bytes plus declared MIME type, ready for the encoder.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    /// The raw document bytes.
    pub bytes: Vec<u8>,
    /// MIME type sniffed from content or extension, lowercase.
    pub mime_type: String,
    /// Where the document came from (path or URL), for logging and history.
    pub source: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve an input string to document bytes and a MIME type.
///
/// If the input is a URL, download it (bounded by `timeout_secs`).
/// If the input is a local file, read it.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<ResolvedDocument, AnalysisError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Read a local file and sniff its MIME type.
fn resolve_local(path_str: &str) -> Result<ResolvedDocument, AnalysisError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(AnalysisError::FileNotFound { path });
    }

    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(AnalysisError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(AnalysisError::FileNotFound { path });
        }
    };

    let mime = sniff_mime(&bytes, Some(&path)).ok_or_else(|| {
        AnalysisError::UnsupportedMediaType {
            mime: "unknown".into(),
        }
    })?;

    debug!(path = %path.display(), mime = %mime, bytes = bytes.len(), "resolved local document");
    Ok(ResolvedDocument {
        bytes,
        mime_type: mime,
        source: path_str.to_string(),
    })
}

/// Download a URL and sniff the MIME type of the body.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedDocument, AnalysisError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AnalysisError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AnalysisError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    // Header is a hint only; content sniffing below has the final say.
    let header_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    let mime = sniff_mime(&bytes, None)
        .or(header_mime)
        .ok_or_else(|| AnalysisError::UnsupportedMediaType {
            mime: "unknown".into(),
        })?;

    info!(mime = %mime, bytes = bytes.len(), "downloaded document");
    Ok(ResolvedDocument {
        bytes,
        mime_type: mime,
        source: url.to_string(),
    })
}

/// Sniff a MIME type from magic bytes, falling back to the file extension.
///
/// Recognises the supported document formats only; anything else is `None`
/// and the caller decides how to report it.
pub fn sniff_mime(bytes: &[u8], path: Option<&Path>) -> Option<String> {
    if bytes.starts_with(b"%PDF") {
        return Some("application/pdf".into());
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg".into());
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png".into());
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp".into());
    }

    let ext = path?.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf".into()),
        "jpg" | "jpeg" => Some("image/jpeg".into()),
        "png" => Some("image/png".into()),
        "webp" => Some("image/webp".into()),
        _ => None,
    }
}
