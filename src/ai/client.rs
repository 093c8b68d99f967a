//! HTTP client for the local text-generation service.
//!
//! The service speaks the Ollama wire protocol: `POST /api/generate` for
//! completions and `GET /api/tags` for the installed-model list (doubling as
//! the availability ping).
//!
//! ## Retry Strategy
//!
//! Exactly one retry, and only on timeout: the prompt is cut to half its
//! length (dense pages are the usual cause of a local model running past the
//! deadline) and sent once more. Parse failures are never retried — the
//! caller's deterministic fallback is cheaper and safer than re-querying a
//! model that already failed to format correctly.

use crate::config::ExtractionConfig;
use crate::error::{PaperdexError, PassError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// One generation request, pass-agnostic.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// User prompt, usually embedding page text.
    pub prompt: String,
    /// System prompt framing the pass.
    pub system: String,
    /// Ask the service for strict JSON output. Set by passes that expect
    /// structured data (keyword extraction).
    pub json_format: bool,
}

/// The seam between the pipeline and the inference service.
///
/// Implemented by [`OllamaClient`] in production and by scripted mocks in
/// tests. Implementations are stateless between calls apart from a reusable
/// connection.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send one prompt and return the raw response text.
    async fn generate(&self, request: GenerateRequest) -> Result<String, PassError>;

    /// Lightweight availability check: can the service answer, and is the
    /// configured model present?
    async fn is_available(&self) -> bool;

    /// The model identifier this client is configured with.
    fn model(&self) -> &str;
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GeneratePayload<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_ctx: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

// ── Client ───────────────────────────────────────────────────────────────

/// Client for an Ollama-compatible local inference service.
///
/// Cheap to clone behind an `Arc`; one instance is created per batch run and
/// shared by every document task. The internal semaphore caps in-flight
/// generate calls across all of them.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    top_p: f32,
    num_ctx: u32,
    ping_timeout: Duration,
    limiter: Arc<Semaphore>,
}

impl OllamaClient {
    /// Build a client from the extraction config.
    pub fn new(config: &ExtractionConfig) -> Result<Self, PaperdexError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| PaperdexError::Internal(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            num_ctx: config.num_ctx,
            ping_timeout: Duration::from_secs(config.ping_timeout_secs),
            limiter: Arc::new(Semaphore::new(config.max_inflight)),
        })
    }

    /// List models installed on the service.
    pub async fn list_models(&self) -> Result<Vec<String>, PassError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .http
            .get(&url)
            .timeout(self.ping_timeout)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !resp.status().is_success() {
            return Err(PassError::ServiceUnavailable {
                reason: format!("GET /api/tags returned {}", resp.status()),
            });
        }

        let tags: TagsResponse = resp.json().await.map_err(|e| PassError::Parse {
            detail: format!("tags response: {e}"),
        })?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn post_generate(&self, prompt: &str, request: &GenerateRequest) -> Result<String, PassError> {
        let payload = GeneratePayload {
            model: &self.model,
            prompt,
            system: &request.system,
            stream: false,
            format: request.json_format.then_some("json"),
            options: GenerateOptions {
                temperature: self.temperature,
                top_p: self.top_p,
                num_ctx: self.num_ctx,
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !resp.status().is_success() {
            return Err(PassError::ServiceUnavailable {
                reason: format!("POST /api/generate returned {}", resp.status()),
            });
        }

        let body: GenerateResponse = resp.json().await.map_err(|e| PassError::Parse {
            detail: format!("generate response: {e}"),
        })?;
        Ok(body.response.trim().to_string())
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, PassError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| PassError::ServiceUnavailable {
                reason: "request limiter closed".into(),
            })?;

        match self.post_generate(&request.prompt, &request).await {
            Ok(text) => Ok(text),
            Err(PassError::ServiceUnavailable { reason }) if reason.contains("timed out") => {
                // One retry with the prompt halved; long pages are the usual
                // cause of a local model blowing the deadline.
                let truncated = truncate_chars(&request.prompt, request.prompt.chars().count() / 2);
                warn!("generate timed out, retrying with truncated prompt");
                self.post_generate(&truncated, &request).await
            }
            Err(e) => Err(e),
        }
    }

    async fn is_available(&self) -> bool {
        match self.list_models().await {
            Ok(models) => {
                let found = models
                    .iter()
                    .any(|name| name.contains(&self.model) || name.starts_with(&self.model));
                if !found {
                    debug!(model = %self.model, "service reachable but model not installed");
                }
                found
            }
            Err(e) => {
                debug!("availability check failed: {e}");
                false
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Map a reqwest transport failure onto the pass-error taxonomy.
///
/// Timeouts keep the phrase "timed out" in the reason so the retry path can
/// recognise them without a separate variant.
fn classify_transport_error(e: reqwest::Error) -> PassError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    };
    PassError::ServiceUnavailable { reason }
}

/// Truncate to at most `max_chars` characters on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "αβγδε";
        assert_eq!(truncate_chars(s, 2), "αβ");
        assert_eq!(truncate_chars(s, 100), s);
        // Never truncates to nothing — an empty retry prompt would be useless.
        assert_eq!(truncate_chars(s, 0), "α");
    }

    #[test]
    fn payload_omits_format_unless_requested() {
        let payload = GeneratePayload {
            model: "m",
            prompt: "p",
            system: "s",
            stream: false,
            format: None,
            options: GenerateOptions {
                temperature: 0.1,
                top_p: 0.9,
                num_ctx: 8192,
            },
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("\"format\""));

        let payload = GeneratePayload {
            format: Some("json"),
            ..payload
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"format\":\"json\""));
    }

    #[test]
    fn client_normalises_trailing_slash() {
        let config = ExtractionConfig::builder()
            .base_url("http://localhost:11434/")
            .build()
            .unwrap();
        let client = OllamaClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
