//! The analysis request/response contract.
//!
//! This module is the single source of truth for what goes over the wire to
//! the model service and what must come back. The request is one data URI;
//! the response is the [`AnalysisResult`] shape. Both the validator
//! ([`crate::pipeline::validate`]) and the instruction prompt
//! ([`crate::prompts`]) are written against exactly these types, so a change
//! here is a change to the whole contract.
//!
//! Wire names are camelCase to match the service-side schema
//! (`documentType`, `keyFacts`, `risksAndFees`, `toDoItems`).

use crate::error::AnalysisError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ── Data-URI grammar ─────────────────────────────────────────────────────

/// Grammar for a self-describing document payload:
/// `data:<mime>;base64,<payload>`.
static RE_DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:(?P<mime>[A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+);base64,(?P<payload>[A-Za-z0-9+/]*={0,2})$")
        .expect("data-URI regex is valid")
});

/// Format raw bytes as a `data:<mime>;base64,<payload>` URI.
pub fn format_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Whether a string matches the data-URI grammar.
pub fn is_data_uri(s: &str) -> bool {
    RE_DATA_URI.is_match(s)
}

/// Split a data URI into its MIME type and still-encoded base64 payload.
///
/// Returns `None` when the string does not match the grammar.
pub fn split_data_uri(s: &str) -> Option<(&str, &str)> {
    let caps = RE_DATA_URI.captures(s)?;
    Some((
        caps.name("mime")?.as_str(),
        caps.name("payload")?.as_str(),
    ))
}

/// Decode a data URI back into its MIME type and original bytes.
///
/// Inverse of [`format_data_uri`]: for every `mime` and `bytes`,
/// `parse_data_uri(&format_data_uri(mime, bytes))` reproduces both exactly.
pub fn parse_data_uri(s: &str) -> Result<(String, Vec<u8>), AnalysisError> {
    let (mime, payload) = split_data_uri(s).ok_or_else(|| AnalysisError::UnrecognizedInput {
        input: truncate_for_message(s),
    })?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| AnalysisError::Encoding {
            detail: format!("base64 payload did not decode: {e}"),
        })?;
    Ok((mime.to_string(), bytes))
}

fn truncate_for_message(s: &str) -> String {
    const MAX: usize = 64;
    if s.len() <= MAX {
        return s.to_string();
    }
    let mut end = MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

// ── Request schema ───────────────────────────────────────────────────────

/// Input to one analysis call: exactly one self-describing document payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// The document as a `data:<mime>;base64,<payload>` URI.
    pub document_data_uri: String,
}

impl AnalysisRequest {
    /// Wrap a data URI, enforcing the grammar and the non-empty invariant.
    pub fn new(document_data_uri: impl Into<String>) -> Result<Self, AnalysisError> {
        let uri = document_data_uri.into();
        let (_, payload) =
            split_data_uri(&uri).ok_or_else(|| AnalysisError::UnrecognizedInput {
                input: truncate_for_message(&uri),
            })?;
        if payload.is_empty() {
            return Err(AnalysisError::EmptyDocument);
        }
        Ok(Self {
            document_data_uri: uri,
        })
    }
}

// ── Response schema ──────────────────────────────────────────────────────

/// One extracted fact with its source citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFact {
    /// The fact itself, free text.
    pub fact: String,
    /// Where in the document the fact was found (page/clause reference).
    pub citation: String,
}

/// One identified risk or fee with its source citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskOrFee {
    /// Description of the risk or fee, free text.
    pub description: String,
    /// Where in the document it was found.
    pub citation: String,
}

/// One action item, optionally with a deadline, with its source citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToDoItem {
    /// What the reader needs to do.
    pub item: String,
    /// Deadline if the document states one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    /// Where in the document the obligation was found.
    pub citation: String,
}

/// The structured outcome of analysing one document.
///
/// Constructed only by [`crate::pipeline::validate::validate`]; a value of
/// this type is guaranteed fully well-formed: all arrays present and every
/// entry carrying a non-blank citation. Immutable once constructed and not
/// persisted by the core (see [`crate::history`] for the external store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Free-text classification, e.g. "Lease Agreement".
    pub document_type: String,
    /// Concise free-text summary of the document.
    pub summary: String,
    /// Ordered extracted facts. May be empty, never absent.
    pub key_facts: Vec<KeyFact>,
    /// Ordered risks and fees. May be empty, never absent.
    pub risks_and_fees: Vec<RiskOrFee>,
    /// Ordered action items. May be empty, never absent.
    pub to_do_items: Vec<ToDoItem>,
}
