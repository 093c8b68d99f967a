//! Configuration types for extraction and AI enhancement.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across tasks, serialise them for logging, and
//! diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::PaperdexError;
use serde::{Deserialize, Serialize};

/// Configuration for document extraction and AI enhancement.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use paperdex::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("qwen2.5:7b")
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Base address of the local inference service. Default: `http://localhost:11434`.
    pub base_url: String,

    /// Model identifier sent with every generate request. Default: `qwen2.5:7b`.
    ///
    /// Smaller instruct models are sufficient for text-fix and classification;
    /// keyword extraction benefits from models with reliable JSON output.
    pub model: String,

    /// Sampling temperature for every pass. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to the page text — exactly
    /// what you want for cleanup and classification. Higher values introduce
    /// creativity that worsens fidelity.
    pub temperature: f32,

    /// Nucleus sampling cutoff passed to the service. Default: 0.9.
    pub top_p: f32,

    /// Context window requested from the service. Default: 8192.
    ///
    /// Scientific pages routinely exceed 2 000 tokens once the prompt scaffold
    /// is added; 8192 covers a full page plus instructions without truncation
    /// on common local models.
    pub num_ctx: u32,

    /// Per-generate-call timeout in seconds. Default: 120.
    ///
    /// Local models on modest hardware can take a minute for a dense page.
    /// Exceeding the timeout triggers one retry with a truncated prompt, then
    /// the pass falls back — never a hang.
    pub api_timeout_secs: u64,

    /// Timeout for the availability ping in seconds. Default: 5.
    pub ping_timeout_secs: u64,

    /// Maximum concurrent in-flight generate calls. Default: 4.
    ///
    /// A single local inference service is a serialization point. Capping
    /// in-flight requests keeps batch runs from stacking up dozens of prompts
    /// the service will answer one at a time anyway.
    pub max_inflight: usize,

    /// Number of documents processed concurrently in batch mode. Default: 2.
    ///
    /// Pages within one document are sequential by design (title carried from
    /// page 1, position-aware classification), so document-level concurrency
    /// is the only parallelism knob.
    pub concurrency: usize,

    /// Maximum fraction of alphanumeric characters the text-fix pass may
    /// lose before its output is rejected. Default: 0.10.
    ///
    /// Guards against the model truncating page content. A rejected fix
    /// silently keeps the raw text for that page.
    pub shrink_tolerance: f64,

    /// Minimum token-overlap Jaccard similarity between a derived title and a
    /// bibliography entry title for a match. Default: 0.5.
    ///
    /// Below the threshold the document keeps `cite_key = None` rather than
    /// guessing.
    pub bib_match_threshold: f64,

    /// Character budget for page text embedded in the classification prompt.
    /// Default: 2000.
    pub classify_prompt_chars: usize,

    /// Character budget for page text embedded in the keyword prompt.
    /// Default: 4000.
    pub keyword_prompt_chars: usize,

    /// Context snippet length stored per keyword association. Default: 200.
    pub context_snippet_chars: usize,

    /// Generate a document-level summary after page processing. Default: false.
    pub generate_summary: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
            temperature: 0.1,
            top_p: 0.9,
            num_ctx: 8192,
            api_timeout_secs: 120,
            ping_timeout_secs: 5,
            max_inflight: 4,
            concurrency: 2,
            shrink_tolerance: 0.10,
            bib_match_threshold: 0.5,
            classify_prompt_chars: 2000,
            keyword_prompt_chars: 4000,
            context_snippet_chars: 200,
            generate_summary: false,
        }
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.top_p = p.clamp(0.0, 1.0);
        self
    }

    pub fn num_ctx(mut self, n: u32) -> Self {
        self.config.num_ctx = n.max(512);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn ping_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ping_timeout_secs = secs.max(1);
        self
    }

    pub fn max_inflight(mut self, n: usize) -> Self {
        self.config.max_inflight = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn shrink_tolerance(mut self, t: f64) -> Self {
        self.config.shrink_tolerance = t.clamp(0.0, 1.0);
        self
    }

    pub fn bib_match_threshold(mut self, t: f64) -> Self {
        self.config.bib_match_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn classify_prompt_chars(mut self, n: usize) -> Self {
        self.config.classify_prompt_chars = n.max(100);
        self
    }

    pub fn keyword_prompt_chars(mut self, n: usize) -> Self {
        self.config.keyword_prompt_chars = n.max(100);
        self
    }

    pub fn context_snippet_chars(mut self, n: usize) -> Self {
        self.config.context_snippet_chars = n.max(20);
        self
    }

    pub fn generate_summary(mut self, v: bool) -> Self {
        self.config.generate_summary = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, PaperdexError> {
        let c = &self.config;
        if c.base_url.trim().is_empty() {
            return Err(PaperdexError::InvalidConfig(
                "base_url must not be empty".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(PaperdexError::InvalidConfig(
                "model must not be empty".into(),
            ));
        }
        if c.concurrency == 0 || c.max_inflight == 0 {
            return Err(PaperdexError::InvalidConfig(
                "Concurrency limits must be ≥ 1".into(),
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
        let config = ExtractionConfig::builder().build().unwrap();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.max_inflight, 4);
        assert!(config.shrink_tolerance > 0.0);
    }

    #[test]
    fn setters_clamp_out_of_range_values() {
        let config = ExtractionConfig::builder()
            .temperature(9.0)
            .shrink_tolerance(3.0)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(config.temperature, 2.0);
        assert_eq!(config.shrink_tolerance, 1.0);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn empty_model_is_rejected() {
        let err = ExtractionConfig::builder().model("  ").build();
        assert!(matches!(err, Err(PaperdexError::InvalidConfig(_))));
    }
}
