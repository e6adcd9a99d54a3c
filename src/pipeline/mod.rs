//! Pipeline stages for document analysis.
//!
//! Each submodule implements exactly one transformation step, independently
//! testable and swappable without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ model ──▶ validate
//! (path/URL) (data URI) (LLM call)  (schema)
//! ```
//!
//! 1. [`input`]    — canonicalise a user-supplied path or URL to bytes plus
//!    a sniffed MIME type (library callers may skip this and pass bytes)
//! 2. [`encode`]   — enforce the size/MIME policy, apply an optional crop,
//!    and produce the `data:<mime>;base64,<payload>` document payload
//! 3. [`model`]    — one call to the external model service per request;
//!    the only stage with network I/O
//! 4. [`validate`] — strict structural validation of the raw model output
//!    into an [`crate::contract::AnalysisResult`]

pub mod encode;
pub mod input;
pub mod model;
pub mod validate;
