//! Output types: the validated result plus per-request accounting.
//!
//! [`RawModelOutput`] is what the model client hands to the validator:
//! unvalidated text plus token usage. [`AnalysisOutcome`] is what the
//! orchestrator hands back to the caller: the validated
//! [`crate::contract::AnalysisResult`] plus [`AnalysisStats`] timings.

use crate::contract::AnalysisResult;
use serde::{Deserialize, Serialize};

/// Raw, unvalidated output of one model call.
///
/// The text has not been checked against the analysis schema; only
/// [`crate::pipeline::validate::validate`] may turn it into an
/// [`AnalysisResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawModelOutput {
    /// The model's response text, expected (not guaranteed) to be JSON.
    pub text: String,
    /// Prompt tokens billed for the call.
    pub input_tokens: usize,
    /// Completion tokens billed for the call.
    pub output_tokens: usize,
    /// Wall-clock duration of the call in milliseconds.
    pub duration_ms: u64,
}

/// Timing and usage accounting for one analysis request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// End-to-end duration: encode + model call + validation.
    pub total_duration_ms: u64,
    /// Time spent encoding (and cropping, if requested) the document.
    pub encode_duration_ms: u64,
    /// Time spent waiting on the model service.
    pub model_duration_ms: u64,
    /// Prompt tokens billed.
    pub input_tokens: usize,
    /// Completion tokens billed.
    pub output_tokens: usize,
}

/// The successful outcome of one analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    /// The validated analysis result.
    pub result: AnalysisResult,
    /// Per-request timings and token usage.
    pub stats: AnalysisStats,
}
