//! Strict structural validation of raw model output.
//!
//! This is the system's reliability guarantee: downstream code may assume a
//! returned [`AnalysisResult`] is always fully well-formed. The policy is
//! strict rejection, never repair:
//!
//! - a missing required field is a [`AnalysisError::SchemaViolation`]
//! - a type mismatch (array delivered as scalar or `null`) is a violation
//! - a missing or blank citation on any fact, risk, or to-do entry is a
//!   violation
//!
//! Nothing is defaulted or patched; a malformed response surfaces as a
//! failure instead of being silently filled with placeholders, which would
//! hide model unreliability behind plausible-looking output.
//!
//! The single transport-level concession: models occasionally wrap their
//! JSON in a markdown code fence despite the prompt forbidding it. The fence
//! is stripped before parsing because it wraps the payload rather than being
//! part of it. Unknown top-level fields are tolerated; they cannot
//! substitute for required ones.

use crate::contract::AnalysisResult;
use crate::error::AnalysisError;
use crate::output::RawModelOutput;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// An outer ```` ```json … ``` ```` (or plain ```` ``` … ``` ````) fence
/// around the whole payload.
static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").expect("fence regex is valid"));

/// Validate raw model output against the analysis schema.
///
/// On success the returned result is a lossless structural copy of the
/// payload: serialising it and validating again yields an identical value.
///
/// # Errors
/// [`AnalysisError::SchemaViolation`] describing the first violation found.
/// The raw payload is logged at debug level for diagnosis and never carried
/// in the error message.
pub fn validate(raw: &RawModelOutput) -> Result<AnalysisResult, AnalysisError> {
    let text = strip_outer_fences(raw.text.trim());

    let result: AnalysisResult = match serde_json::from_str(text) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(raw = %raw.text, "model output failed schema parse");
            return Err(AnalysisError::SchemaViolation {
                detail: e.to_string(),
            });
        }
    };

    if let Err(detail) = check_citations(&result) {
        debug!(raw = %raw.text, %detail, "model output failed citation check");
        return Err(AnalysisError::SchemaViolation { detail });
    }

    Ok(result)
}

/// Strip a single outer markdown fence if the model disobeyed the prompt.
fn strip_outer_fences(input: &str) -> &str {
    match RE_OUTER_FENCES.captures(input) {
        Some(caps) => caps.get(1).map_or(input, |m| m.as_str()),
        None => input,
    }
}

/// Every entry in every array must carry a non-blank citation.
fn check_citations(result: &AnalysisResult) -> Result<(), String> {
    for (i, fact) in result.key_facts.iter().enumerate() {
        if fact.citation.trim().is_empty() {
            return Err(format!("keyFacts[{i}].citation is empty"));
        }
    }
    for (i, risk) in result.risks_and_fees.iter().enumerate() {
        if risk.citation.trim().is_empty() {
            return Err(format!("risksAndFees[{i}].citation is empty"));
        }
    }
    for (i, item) in result.to_do_items.iter().enumerate() {
        if item.citation.trim().is_empty() {
            return Err(format!("toDoItems[{i}].citation is empty"));
        }
    }
    Ok(())
}
