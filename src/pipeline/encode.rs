//! Document encoding: raw bytes → base64 data URI payload.
//!
//! The encoder is the policy gate of the pipeline: the MIME allow-list and
//! the size ceiling are enforced here, before the base64 buffer is
//! allocated, so an oversized or unsupported upload never costs memory or a
//! network call. The produced [`DocumentPayload`] is immutable and decodes
//! back to exactly the original bytes.
//!
//! Captured photos go through [`encode_cropped`] first: the user-selected
//! rectangle is cut out with the `image` crate and re-encoded as PNG
//! (lossless, so the crop never degrades text the model has to read), then
//! the result takes the same policy gate as any other upload.

use crate::config::AnalysisConfig;
use crate::contract::{format_data_uri, parse_data_uri};
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// A self-describing, transmission-ready document payload.
///
/// Created once per upload or capture event; immutable; discarded after the
/// request completes or fails. Holds the encoded form only; use
/// [`DocumentPayload::decode`] to recover the original bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPayload {
    /// Declared MIME type, lowercase, from the configured allow-list.
    pub mime_type: String,
    /// Size of the original (un-encoded) document in bytes.
    pub byte_len: usize,
    /// The `data:<mime>;base64,<payload>` URI.
    pub data_uri: String,
}

impl DocumentPayload {
    /// Recover the original document bytes from the data URI.
    pub fn decode(&self) -> Result<Vec<u8>, AnalysisError> {
        let (_, bytes) = parse_data_uri(&self.data_uri)?;
        Ok(bytes)
    }
}

/// A user-specified crop rectangle in pixel coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Encode a document for transmission.
///
/// # Errors
/// - [`AnalysisError::UnsupportedMediaType`] when `declared_mime` is not in
///   the configured allow-list
/// - [`AnalysisError::EmptyDocument`] for zero-length input
/// - [`AnalysisError::DocumentTooLarge`] when the input exceeds
///   `config.max_document_bytes` (checked before encoding)
pub fn encode(
    bytes: &[u8],
    declared_mime: &str,
    config: &AnalysisConfig,
) -> Result<DocumentPayload, AnalysisError> {
    let mime = declared_mime.to_ascii_lowercase();
    if !config.is_mime_allowed(&mime) {
        return Err(AnalysisError::UnsupportedMediaType { mime });
    }
    if bytes.is_empty() {
        return Err(AnalysisError::EmptyDocument);
    }
    if bytes.len() > config.max_document_bytes {
        return Err(AnalysisError::DocumentTooLarge {
            size: bytes.len(),
            limit: config.max_document_bytes,
        });
    }

    let data_uri = format_data_uri(&mime, bytes);
    debug!(mime = %mime, bytes = bytes.len(), encoded = data_uri.len(), "encoded document payload");

    Ok(DocumentPayload {
        mime_type: mime,
        byte_len: bytes.len(),
        data_uri,
    })
}

/// Crop a captured photo to the user-selected rectangle, then encode.
///
/// The crop output is always PNG regardless of the capture format, so the
/// re-encode is lossless. The cropped image passes through [`encode`] and is
/// therefore subject to the same size ceiling as a direct upload.
///
/// # Errors
/// - [`AnalysisError::InvalidCrop`] for a zero-area or out-of-bounds
///   rectangle, or when `declared_mime` is not an image type
/// - [`AnalysisError::UnreadableImage`] when the bytes do not decode as an
///   image of the declared type
/// - plus everything [`encode`] can return
pub fn encode_cropped(
    bytes: &[u8],
    declared_mime: &str,
    rect: CropRect,
    config: &AnalysisConfig,
) -> Result<DocumentPayload, AnalysisError> {
    let mime = declared_mime.to_ascii_lowercase();
    if !config.is_mime_allowed(&mime) {
        return Err(AnalysisError::UnsupportedMediaType { mime });
    }
    if !mime.starts_with("image/") {
        return Err(AnalysisError::InvalidCrop {
            detail: format!("'{mime}' documents cannot be cropped; only images can"),
        });
    }
    if rect.width == 0 || rect.height == 0 {
        return Err(AnalysisError::InvalidCrop {
            detail: format!("zero-area rectangle {}x{}", rect.width, rect.height),
        });
    }

    let img = image::load_from_memory(bytes).map_err(|e| AnalysisError::UnreadableImage {
        detail: e.to_string(),
    })?;

    let (img_w, img_h) = (img.width(), img.height());
    let within = rect
        .x
        .checked_add(rect.width)
        .is_some_and(|right| right <= img_w)
        && rect
            .y
            .checked_add(rect.height)
            .is_some_and(|bottom| bottom <= img_h);
    if !within {
        return Err(AnalysisError::InvalidCrop {
            detail: format!(
                "rectangle {}x{}+{}+{} exceeds image bounds {}x{}",
                rect.width, rect.height, rect.x, rect.y, img_w, img_h
            ),
        });
    }

    let cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);
    let mut buf = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| AnalysisError::Encoding {
            detail: format!("PNG re-encode of cropped image failed: {e}"),
        })?;

    debug!(
        source = %mime,
        rect = format!("{}x{}+{}+{}", rect.width, rect.height, rect.x, rect.y),
        "cropped capture re-encoded as PNG"
    );

    encode(&buf, "image/png", config)
}
