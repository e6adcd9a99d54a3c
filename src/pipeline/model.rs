//! Model interaction: one provider call per analysis request.
//!
//! The [`ModelClient`] trait is the seam the orchestrator is tested
//! through: production code uses [`LlmModelClient`] over an
//! `edgequake_llm` provider, tests substitute a mock. The client is
//! deliberately thin; the instruction prompt lives in [`crate::prompts`]
//! and validation lives in [`crate::pipeline::validate`].
//!
//! There is NO retry here. A transient service failure surfaces as
//! [`AnalysisError::Service`] exactly once; whether to try again is the
//! caller's decision, not the pipeline's.

use crate::config::AnalysisConfig;
use crate::contract::{split_data_uri, AnalysisRequest};
use crate::error::AnalysisError;
use crate::output::RawModelOutput;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Model used when neither config nor environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// The outbound seam of the pipeline: one request in, raw output or a typed
/// failure out.
///
/// Implementations must be `Send + Sync`; the orchestrator shares one client
/// across requests (only one of which is in flight at a time).
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Issue exactly one call to the model service for this request.
    ///
    /// The raw output is passed through unvalidated; callers hand it to
    /// [`crate::pipeline::validate::validate`].
    async fn invoke(&self, request: &AnalysisRequest) -> Result<RawModelOutput, AnalysisError>;
}

/// Production [`ModelClient`] backed by an `edgequake_llm` provider.
pub struct LlmModelClient {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    system_prompt: Option<String>,
    deadline: Duration,
}

impl LlmModelClient {
    /// Build a client from a resolved provider and the analysis config.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AnalysisConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
            deadline: Duration::from_secs(config.api_timeout_secs),
        }
    }
}

/// Build `CompletionOptions` from the configured sampling knobs.
fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

#[async_trait]
impl ModelClient for LlmModelClient {
    async fn invoke(&self, request: &AnalysisRequest) -> Result<RawModelOutput, AnalysisError> {
        let start = Instant::now();
        let (mime, payload) =
            split_data_uri(&request.document_data_uri).ok_or_else(|| AnalysisError::Internal(
                "AnalysisRequest carried a malformed data URI".into(),
            ))?;

        let system_prompt = self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT);

        // The provider requires at least one user turn; the document
        // attachment carries all the actual content.
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user_with_images("", vec![ImageData::new(payload.to_string(), mime)]),
        ];

        let options = build_options(self.temperature, self.max_tokens);

        match timeout(self.deadline, self.provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                debug!(
                    input_tokens = response.prompt_tokens,
                    output_tokens = response.completion_tokens,
                    elapsed_ms = duration.as_millis() as u64,
                    "model call completed"
                );
                Ok(RawModelOutput {
                    text: response.content,
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    duration_ms: duration.as_millis() as u64,
                })
            }
            Ok(Err(e)) => {
                warn!(error = %e, "model call failed");
                Err(AnalysisError::Service {
                    detail: e.to_string(),
                })
            }
            Err(_) => {
                let secs = self.deadline.as_secs();
                warn!(secs, "model call exceeded deadline");
                Err(AnalysisError::Timeout { secs })
            }
        }
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed
///    the provider entirely; used as-is (tests, custom middleware).
/// 2. **Named provider + model** (`config.provider_name`) — reads the
///    corresponding API key from the environment.
/// 3. **Environment pair** (`DOCULENS_LLM_PROVIDER` + `DOCULENS_MODEL`) —
///    a shell-level choice, honoured even when multiple API keys exist.
/// 4. **Full auto-detection** — prefer OpenAI when `OPENAI_API_KEY` is set,
///    otherwise let `ProviderFactory::from_env` scan all known keys.
pub fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("DOCULENS_LLM_PROVIDER"),
        std::env::var("DOCULENS_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalysisError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}

/// Instantiate a named provider with the given model.
fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalysisError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
