//! Error types for the doculens library.
//!
//! Every failure a request can end in is a variant of [`AnalysisError`], and
//! every variant maps onto exactly one [`FailureKind`]. The kind is the
//! contract with presentation layers: it tells them whether the user can fix
//! the problem (`InvalidInput`), whether "try again" is worth offering
//! (`Service`, `Timeout`), or whether the backend misbehaved
//! (`SchemaViolation`). The variant itself carries the human-readable detail.
//!
//! A request that fails is terminal: no partial or degraded result is ever
//! returned alongside an error, and nothing in this crate retries on its own.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the doculens library.
///
/// Use [`AnalysisError::kind`] to classify a variant for user messaging and
/// [`AnalysisError::is_retryable`] to decide whether a retry affordance makes
/// sense.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Local input errors ────────────────────────────────────────────────
    /// The declared MIME type is not in the configured allow-list.
    #[error("Unsupported document type '{mime}'. Supported: PDF, JPEG, PNG, WEBP.")]
    UnsupportedMediaType { mime: String },

    /// The document exceeds the configured size ceiling.
    #[error("Document is {size} bytes; the limit is {limit} bytes.\nReduce the file size or raise max_document_bytes.")]
    DocumentTooLarge { size: usize, limit: usize },

    /// The document is empty.
    #[error("Document is empty (0 bytes)")]
    EmptyDocument,

    /// The crop rectangle is degenerate, out of bounds, or the document
    /// cannot be cropped at all.
    #[error("Invalid crop: {detail}")]
    InvalidCrop { detail: String },

    /// The captured photo bytes could not be decoded as an image.
    #[error("Image could not be decoded: {detail}")]
    UnreadableImage { detail: String },

    // ── Input resolution errors ───────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    UnrecognizedInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Model service errors ──────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The external model service failed: transport, auth, quota, or any
    /// non-success response. Never retried by the core.
    #[error("Model service error: {detail}")]
    Service { detail: String },

    /// The model call exceeded the configured deadline.
    #[error("Model call timed out after {secs}s")]
    Timeout { secs: u64 },

    // ── Validation errors ─────────────────────────────────────────────────
    /// The model's output failed structural validation against the analysis
    /// schema. The offending payload is logged at debug level, never shown
    /// to end users through this message.
    #[error("Model output did not match the analysis schema: {detail}")]
    SchemaViolation { detail: String },

    // ── Orchestration errors ──────────────────────────────────────────────
    /// A request was submitted while another was in flight on the same
    /// orchestrator instance. Rejected immediately, never queued.
    #[error("An analysis is already in progress on this instance")]
    Busy,

    // ── Defect signals ────────────────────────────────────────────────────
    /// Byte-to-text or image re-encoding failed on input that passed local
    /// validation. Indicates a defect, not a user error.
    #[error("Encoding failed: {detail}")]
    Encoding { detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`AnalysisError`] for presentation layers.
///
/// Mutually exclusive with a successful result: one request yields either
/// one [`crate::output::AnalysisOutcome`] or one failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// The user-supplied file failed local validation; the user can fix it.
    InvalidInput,
    /// The external model service failed; a caller-driven retry may help.
    Service,
    /// The model call exceeded its deadline; messaged like a service error,
    /// logged distinctly.
    Timeout,
    /// The model's output failed structural validation; a backend or prompt
    /// defect rather than a user or network problem.
    SchemaViolation,
    /// A request overlapped an in-flight one on the same instance.
    Busy,
    /// A defect inside this crate or its configuration.
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::InvalidInput => "invalid-input",
            FailureKind::Service => "service",
            FailureKind::Timeout => "timeout",
            FailureKind::SchemaViolation => "schema-violation",
            FailureKind::Busy => "busy",
            FailureKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl AnalysisError {
    /// Classify this error for user messaging.
    pub fn kind(&self) -> FailureKind {
        match self {
            AnalysisError::UnsupportedMediaType { .. }
            | AnalysisError::DocumentTooLarge { .. }
            | AnalysisError::EmptyDocument
            | AnalysisError::InvalidCrop { .. }
            | AnalysisError::UnreadableImage { .. }
            | AnalysisError::FileNotFound { .. }
            | AnalysisError::PermissionDenied { .. }
            | AnalysisError::UnrecognizedInput { .. }
            | AnalysisError::DownloadFailed { .. }
            | AnalysisError::DownloadTimeout { .. } => FailureKind::InvalidInput,

            AnalysisError::ProviderNotConfigured { .. } | AnalysisError::Service { .. } => {
                FailureKind::Service
            }

            AnalysisError::Timeout { .. } => FailureKind::Timeout,

            AnalysisError::SchemaViolation { .. } => FailureKind::SchemaViolation,

            AnalysisError::Busy => FailureKind::Busy,

            AnalysisError::Encoding { .. }
            | AnalysisError::InvalidConfig(_)
            | AnalysisError::Internal(_) => FailureKind::Internal,
        }
    }

    /// Whether a caller-driven retry of the same request could plausibly
    /// succeed. True only for transient service-side failures.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), FailureKind::Service | FailureKind::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_large_display_carries_both_numbers() {
        let e = AnalysisError::DocumentTooLarge {
            size: 52_428_800,
            limit: 10_485_760,
        };
        let msg = e.to_string();
        assert!(msg.contains("52428800"), "got: {msg}");
        assert!(msg.contains("10485760"), "got: {msg}");
    }

    #[test]
    fn input_errors_classify_as_invalid_input() {
        let errors = [
            AnalysisError::UnsupportedMediaType {
                mime: "text/html".into(),
            },
            AnalysisError::EmptyDocument,
            AnalysisError::InvalidCrop {
                detail: "zero-area rectangle".into(),
            },
        ];
        for e in errors {
            assert_eq!(e.kind(), FailureKind::InvalidInput, "{e}");
            assert!(!e.is_retryable());
        }
    }

    #[test]
    fn service_and_timeout_are_retryable() {
        assert!(AnalysisError::Service {
            detail: "HTTP 503".into()
        }
        .is_retryable());
        assert!(AnalysisError::Timeout { secs: 60 }.is_retryable());
    }

    #[test]
    fn schema_violation_is_not_retryable() {
        let e = AnalysisError::SchemaViolation {
            detail: "keyFacts[0].citation is empty".into(),
        };
        assert_eq!(e.kind(), FailureKind::SchemaViolation);
        assert!(!e.is_retryable());
    }

    #[test]
    fn busy_display() {
        assert!(AnalysisError::Busy.to_string().contains("in progress"));
    }

    #[test]
    fn failure_kind_serializes_camel_case() {
        let json = serde_json::to_string(&FailureKind::SchemaViolation).unwrap();
        assert_eq!(json, "\"schemaViolation\"");
    }
}
