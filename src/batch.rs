//! Batch analysis: many documents, one orchestrator instance each.
//!
//! Orchestrator instances share no mutable state, so independent documents
//! can be analyzed concurrently without locking. The provider is resolved
//! once and the resulting client shared; each document still gets its own
//! state machine, preserving the one-request-per-instance rule. One failed
//! document never aborts the batch; every input gets its own outcome.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::orchestrator::Orchestrator;
use crate::output::AnalysisOutcome;
use crate::pipeline::model::{resolve_provider, LlmModelClient, ModelClient};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::info;

/// One document going into a batch.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    /// Display name (file name, URL, upload id) used in results and logs.
    pub name: String,
    /// Raw document bytes.
    pub bytes: Vec<u8>,
    /// Declared MIME type.
    pub mime_type: String,
}

/// The per-document outcome of a batch run, in input order.
#[derive(Debug)]
pub struct BatchItem {
    /// The input's display name.
    pub name: String,
    /// This document's result or typed failure.
    pub outcome: Result<AnalysisOutcome, AnalysisError>,
}

/// Analyze a set of documents with bounded concurrency.
///
/// Returns one [`BatchItem`] per input, in input order. The outer `Result`
/// fails only when no provider could be resolved at all; per-document
/// failures live inside the items.
pub async fn analyze_batch(
    inputs: Vec<DocumentInput>,
    config: &AnalysisConfig,
    concurrency: usize,
) -> Result<Vec<BatchItem>, AnalysisError> {
    let provider = resolve_provider(config)?;
    let client: Arc<dyn ModelClient> = Arc::new(LlmModelClient::new(provider, config));
    Ok(analyze_batch_with_client(inputs, config, client, concurrency).await)
}

/// [`analyze_batch`] with an injected model client (tests, middleware).
pub async fn analyze_batch_with_client(
    inputs: Vec<DocumentInput>,
    config: &AnalysisConfig,
    client: Arc<dyn ModelClient>,
    concurrency: usize,
) -> Vec<BatchItem> {
    let total = inputs.len();
    info!(total, "starting batch analysis");

    let mut items: Vec<(usize, BatchItem)> = stream::iter(inputs.into_iter().enumerate().map(
        |(idx, input)| {
            let config = config.clone();
            let client = Arc::clone(&client);
            async move {
                let orchestrator = Orchestrator::with_client(config, client);
                let outcome = orchestrator.analyze(&input.bytes, &input.mime_type).await;
                (
                    idx,
                    BatchItem {
                        name: input.name,
                        outcome,
                    },
                )
            }
        },
    ))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    // Completion order is arbitrary under buffer_unordered.
    items.sort_by_key(|(idx, _)| *idx);
    items.into_iter().map(|(_, item)| item).collect()
}
