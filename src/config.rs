//! Configuration types for document analysis.
//!
//! All behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. Every limit the pipeline enforces (size
//! ceiling, MIME allow-list, call deadline) and every credential-bearing
//! knob (provider, model) lives here and is injected at construction time;
//! no component reads ambient global state, which keeps the orchestrator
//! testable with a mocked model client.

use crate::error::AnalysisError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// MIME types accepted by default: PDF plus the common photo formats.
pub const DEFAULT_ALLOWED_MIME_TYPES: [&str; 4] = [
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/webp",
];

/// Default document size ceiling: 10 MiB.
///
/// Large enough for multi-page phone-camera captures, small enough that the
/// base64 expansion (~4/3×) stays comfortably below typical API body limits.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for a document analysis.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use doculens::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .max_document_bytes(4 * 1024 * 1024)
///     .api_timeout_secs(30)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Maximum accepted document size in bytes. Default: 10 MiB.
    ///
    /// Enforced before base64 encoding so an oversized upload never
    /// allocates its encoded buffer, let alone reaches the network.
    pub max_document_bytes: usize,

    /// MIME types the encoder accepts (lowercase). Default:
    /// [`DEFAULT_ALLOWED_MIME_TYPES`].
    pub allowed_mime_types: Vec<String>,

    /// LLM model identifier, e.g. "gpt-4.1-mini", "gemini-2.0-flash".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is auto-detected from
    /// the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the model call. Default: 0.2.
    ///
    /// Extraction wants the model faithful to the page, not creative;
    /// near-zero temperature also makes the JSON shape more stable.
    pub temperature: f32,

    /// Maximum tokens the model may generate per analysis. Default: 2048.
    ///
    /// A dense contract can produce a long fact list; 2048 covers it while
    /// keeping per-document cost predictable.
    pub max_tokens: usize,

    /// Custom instruction prompt. If None, uses the built-in default
    /// ([`crate::prompts::DEFAULT_SYSTEM_PROMPT`]).
    pub system_prompt: Option<String>,

    /// Per-model-call deadline in seconds. Default: 60.
    ///
    /// Expiry surfaces as [`AnalysisError::Timeout`], a terminal failure,
    /// never an indefinite hang.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 2048,
            system_prompt: None,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("max_document_bytes", &self.max_document_bytes)
            .field("allowed_mime_types", &self.allowed_mime_types)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether a declared MIME type is in the allow-list.
    ///
    /// Comparison is case-insensitive; the list itself is stored lowercase.
    pub fn is_mime_allowed(&self, mime: &str) -> bool {
        let mime = mime.to_ascii_lowercase();
        self.allowed_mime_types.iter().any(|m| *m == mime)
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn max_document_bytes(mut self, n: usize) -> Self {
        self.config.max_document_bytes = n;
        self
    }

    /// Replace the MIME allow-list. Entries are lowercased.
    pub fn allowed_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_mime_types = types
            .into_iter()
            .map(|s| s.into().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalysisError> {
        let c = &self.config;
        if c.max_document_bytes == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_document_bytes must be ≥ 1".into(),
            ));
        }
        if c.allowed_mime_types.is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "allowed_mime_types must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::builder().build().unwrap();
        assert_eq!(config.max_document_bytes, DEFAULT_MAX_DOCUMENT_BYTES);
        assert_eq!(config.api_timeout_secs, 60);
        assert!(config.is_mime_allowed("application/pdf"));
        assert!(config.is_mime_allowed("IMAGE/JPEG"));
        assert!(!config.is_mime_allowed("text/html"));
    }

    #[test]
    fn empty_allow_list_is_rejected() {
        let err = AnalysisConfig::builder()
            .allowed_mime_types(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn zero_size_limit_is_rejected() {
        let err = AnalysisConfig::builder()
            .max_document_bytes(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn custom_allow_list_is_lowercased() {
        let config = AnalysisConfig::builder()
            .allowed_mime_types(["Image/PNG"])
            .build()
            .unwrap();
        assert!(config.is_mime_allowed("image/png"));
        assert!(!config.is_mime_allowed("application/pdf"));
    }

    #[test]
    fn temperature_is_clamped() {
        let config = AnalysisConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(config.temperature, 2.0);
    }
}
