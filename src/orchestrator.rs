//! The analysis orchestrator: encode → request → validate as an explicit
//! state machine.
//!
//! Each request walks `Idle → Encoding → Requesting → Validating` and ends
//! in `Succeeded` or `Failed`; both are terminal for that request. The
//! phase is pure data in a `tokio::sync::watch` channel, observable by any
//! rendering layer through [`Orchestrator::subscribe`] (push) or
//! [`Orchestrator::phase`] (poll), with no UI runtime involved.
//!
//! One request is in flight per instance. A second `analyze` call before
//! the first reaches a terminal state is rejected with
//! [`AnalysisError::Busy`] immediately; nothing queues. The in-flight claim
//! is released by an RAII guard, so a caller that abandons (drops) an
//! `analyze` future leaves the instance reusable, and every request owns
//! its locals outright; an abandoned request cannot write into a later one.
//!
//! Stage failures short-circuit: a document that fails local validation
//! never reaches the model client, and no failure is retried here.

use crate::config::AnalysisConfig;
use crate::contract::AnalysisRequest;
use crate::error::{AnalysisError, FailureKind};
use crate::output::{AnalysisOutcome, AnalysisStats};
use crate::pipeline::encode::{self, CropRect, DocumentPayload};
use crate::pipeline::input;
use crate::pipeline::model::{resolve_provider, LlmModelClient, ModelClient};
use crate::pipeline::validate;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};

/// Where an orchestrator currently is in its request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisPhase {
    /// No request has run yet on this instance.
    Idle,
    /// Running the document encoder.
    Encoding,
    /// Waiting on the model service.
    Requesting,
    /// Checking the model output against the schema.
    Validating,
    /// Terminal: the last request produced a validated result.
    Succeeded,
    /// Terminal: the last request failed with this kind.
    Failed(FailureKind),
}

impl fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisPhase::Idle => f.write_str("idle"),
            AnalysisPhase::Encoding => f.write_str("encoding"),
            AnalysisPhase::Requesting => f.write_str("requesting"),
            AnalysisPhase::Validating => f.write_str("validating"),
            AnalysisPhase::Succeeded => f.write_str("succeeded"),
            AnalysisPhase::Failed(kind) => write!(f, "failed ({kind})"),
        }
    }
}

/// A stream of phase transitions, for callers that prefer `Stream` over a
/// raw watch receiver.
pub type PhaseStream = WatchStream<AnalysisPhase>;

/// Drives one document at a time through the analysis pipeline.
///
/// # Example
/// ```rust,no_run
/// use doculens::{AnalysisConfig, Orchestrator};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AnalysisConfig::default();
/// let orchestrator = Orchestrator::new(config)?;
/// let bytes = std::fs::read("lease.pdf")?;
/// let outcome = orchestrator.analyze(&bytes, "application/pdf").await?;
/// println!("{}: {}", outcome.result.document_type, outcome.result.summary);
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    config: AnalysisConfig,
    client: Arc<dyn ModelClient>,
    phase: watch::Sender<AnalysisPhase>,
    in_flight: AtomicBool,
}

impl Orchestrator {
    /// Build an orchestrator with a real provider-backed model client.
    ///
    /// Provider resolution follows
    /// [`crate::pipeline::model::resolve_provider`]; failure here means no
    /// provider could be configured, not that a document failed.
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        let provider = resolve_provider(&config)?;
        let client: Arc<dyn ModelClient> = Arc::new(LlmModelClient::new(provider, &config));
        Ok(Self::with_client(config, client))
    }

    /// Build an orchestrator around any [`ModelClient`].
    ///
    /// This is the injection point for tests and for callers that wrap the
    /// real client in middleware.
    pub fn with_client(config: AnalysisConfig, client: Arc<dyn ModelClient>) -> Self {
        let (phase, _) = watch::channel(AnalysisPhase::Idle);
        Self {
            config,
            client,
            phase,
            in_flight: AtomicBool::new(false),
        }
    }

    /// The current phase (polling interface).
    pub fn phase(&self) -> AnalysisPhase {
        *self.phase.borrow()
    }

    /// Subscribe to phase transitions (push interface).
    pub fn subscribe(&self) -> watch::Receiver<AnalysisPhase> {
        self.phase.subscribe()
    }

    /// Phase transitions as a `Stream`.
    pub fn phase_stream(&self) -> PhaseStream {
        WatchStream::new(self.phase.subscribe())
    }

    /// Analyze one document: validated result or typed failure.
    pub async fn analyze(
        &self,
        bytes: &[u8],
        mime: &str,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        self.run(|config| encode::encode(bytes, mime, config)).await
    }

    /// Analyze a captured photo, cropping it to `rect` first.
    pub async fn analyze_cropped(
        &self,
        bytes: &[u8],
        mime: &str,
        rect: CropRect,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        self.run(|config| encode::encode_cropped(bytes, mime, rect, config))
            .await
    }

    async fn run<F>(&self, encode_step: F) -> Result<AnalysisOutcome, AnalysisError>
    where
        F: FnOnce(&AnalysisConfig) -> Result<DocumentPayload, AnalysisError>,
    {
        // Rejecting an overlapping call must not disturb the in-flight
        // request, so the phase channel is untouched on the Busy path.
        let _guard = self.try_claim()?;
        let total_start = Instant::now();

        // ── Encoding ────────────────────────────────────────────────────
        self.phase.send_replace(AnalysisPhase::Encoding);
        let encode_start = Instant::now();
        let payload = match encode_step(&self.config) {
            Ok(p) => p,
            Err(e) => return Err(self.fail(e)),
        };
        let request = match AnalysisRequest::new(payload.data_uri) {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e)),
        };
        let encode_duration_ms = encode_start.elapsed().as_millis() as u64;

        // ── Requesting ──────────────────────────────────────────────────
        self.phase.send_replace(AnalysisPhase::Requesting);
        let model_start = Instant::now();
        let raw = match self.client.invoke(&request).await {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e)),
        };
        let model_duration_ms = model_start.elapsed().as_millis() as u64;

        // ── Validating ──────────────────────────────────────────────────
        self.phase.send_replace(AnalysisPhase::Validating);
        let result = match validate::validate(&raw) {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e)),
        };

        // ── Succeeded ───────────────────────────────────────────────────
        self.phase.send_replace(AnalysisPhase::Succeeded);
        let stats = AnalysisStats {
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            encode_duration_ms,
            model_duration_ms,
            input_tokens: raw.input_tokens,
            output_tokens: raw.output_tokens,
        };
        info!(
            document_type = %result.document_type,
            total_ms = stats.total_duration_ms,
            "analysis succeeded"
        );

        Ok(AnalysisOutcome { result, stats })
    }

    /// Claim the single in-flight slot or reject with `Busy`.
    fn try_claim(&self) -> Result<InFlightGuard<'_>, AnalysisError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AnalysisError::Busy);
        }
        Ok(InFlightGuard {
            flag: &self.in_flight,
        })
    }

    /// Record the terminal failure phase and pass the error through.
    fn fail(&self, e: AnalysisError) -> AnalysisError {
        warn!(kind = %e.kind(), error = %e, "analysis failed");
        self.phase.send_replace(AnalysisPhase::Failed(e.kind()));
        e
    }
}

/// Releases the in-flight claim on drop, including when the `analyze`
/// future is abandoned mid-request.
#[derive(Debug)]
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ── Convenience entry points ─────────────────────────────────────────────

/// Analyze one document with a fresh orchestrator.
///
/// This is the primary one-shot entry point for library callers holding
/// bytes. For repeated requests (or phase observation) construct an
/// [`Orchestrator`] directly.
pub async fn analyze(
    bytes: &[u8],
    mime: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, AnalysisError> {
    Orchestrator::new(config.clone())?.analyze(bytes, mime).await
}

/// Analyze a document given a local path or HTTP(S) URL.
///
/// Resolves the input (reading or downloading, sniffing the MIME type) and
/// then analyzes it.
pub async fn analyze_path(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, AnalysisError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    analyze(&resolved.bytes, &resolved.mime_type, config).await
}
