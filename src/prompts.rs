//! The instruction prompt sent with every analysis request.
//!
//! Centralising the prompt here keeps the contract in one place: the field
//! names and citation rule it spells out are exactly the
//! [`crate::contract::AnalysisResult`] schema the validator enforces.
//! Callers can override it via
//! [`crate::config::AnalysisConfig::system_prompt`]; the constant here is
//! used only when no override is provided.

/// Default instruction prompt for document analysis.
///
/// Used when `AnalysisConfig::system_prompt` is `None`. The model receives
/// this as the system message and the document as an attached payload.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert document intelligence assistant. You will receive a single document (a PDF or a photo of a document). Analyze it and respond with a single JSON object, nothing else.

The JSON object must have exactly these fields:

1. "documentType" (string): a short classification of the document, for example "Lease Agreement", "Invoice", "Terms of Service".

2. "summary" (string): a concise plain-language summary of the document. Be brief; two to four sentences.

3. "keyFacts" (array): the most important facts in the document. Each entry is an object with:
   - "fact" (string): the fact itself
   - "citation" (string): where in the document it appears, e.g. "Page 2, Clause 4.1"

4. "risksAndFees" (array): obligations, penalties, fees, and other risks to the reader. Each entry is an object with:
   - "description" (string)
   - "citation" (string)

5. "toDoItems" (array): concrete actions the reader must take. Each entry is an object with:
   - "item" (string)
   - "deadline" (string, only if the document states one)
   - "citation" (string)

Rules:
- Every entry in every array MUST include a non-empty "citation".
- Include all five fields even when an array is empty; use [] for empty arrays.
- Output ONLY the JSON object. No markdown fences, no commentary, no preamble."#;
