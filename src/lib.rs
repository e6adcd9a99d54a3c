//! # doculens
//!
//! Analyze legal and administrative documents (leases, contracts, invoices,
//! terms of service) with an LLM, producing a validated, structured result:
//! classification, summary, key facts, risks and fees, and action items,
//! every entry backed by a citation into the source document.
//!
//! ## Why this crate?
//!
//! Calling an LLM is easy; trusting its output is not. This crate wraps the
//! one call in a contract: the document is policy-checked and encoded
//! locally, the model is asked for exactly one JSON shape, and the response
//! is strictly validated before anything downstream sees it. A
//! [`contract::AnalysisResult`] in hand is guaranteed fully well-formed; a
//! malformed response is a typed failure, never a silently patched result.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document (PDF / photo)
//!  │
//!  ├─ 1. Encode    allow-list + size ceiling, optional crop, base64 data URI
//!  ├─ 2. Request   one call to the model service (no retry, hard deadline)
//!  ├─ 3. Validate  strict schema check, citations required per entry
//!  └─ 4. Outcome   AnalysisResult + stats, or a typed AnalysisError
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doculens::{analyze, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = AnalysisConfig::default();
//!     let bytes = std::fs::read("lease.pdf")?;
//!     let outcome = analyze(&bytes, "application/pdf", &config).await?;
//!     println!("{}", outcome.result.summary);
//!     for fact in &outcome.result.key_facts {
//!         println!("- {} ({})", fact.fact, fact.citation);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! For repeated requests, phase observation, or mock injection, construct an
//! [`Orchestrator`] directly; its state machine is observable through
//! [`Orchestrator::subscribe`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doculens` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! doculens = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod contract;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{analyze_batch, BatchItem, DocumentInput};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use contract::{AnalysisRequest, AnalysisResult, KeyFact, RiskOrFee, ToDoItem};
pub use error::{AnalysisError, FailureKind};
pub use history::{HistoryRecord, HistoryStore, JsonlHistory, MemoryHistory, RecordStatus};
pub use orchestrator::{analyze, analyze_path, AnalysisPhase, Orchestrator, PhaseStream};
pub use output::{AnalysisOutcome, AnalysisStats, RawModelOutput};
pub use pipeline::encode::{CropRect, DocumentPayload};
pub use pipeline::model::{LlmModelClient, ModelClient};
