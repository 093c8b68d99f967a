//! Validated per-pass result types.
//!
//! The model's output is never handed to the pipeline raw. Each pass has its
//! own result type with a `parse` constructor that either validates the shape
//! or returns [`PassError::Parse`] — and the pipeline maps a parse failure
//! deterministically onto that pass's fallback. There is no path from "the
//! model produced something odd" to "the document failed".

use crate::error::PassError;
use crate::output::ContentType;
use serde::Deserialize;

/// Result of the text-fix pass: the corrected page text.
#[derive(Debug, Clone)]
pub struct TextFixResult {
    pub text: String,
}

impl TextFixResult {
    /// Validate a raw fix response.
    ///
    /// An empty response is a parse failure — the model answered with
    /// nothing, and substituting an empty page for real content is exactly
    /// what the fallback policy exists to prevent.
    pub fn parse(raw: &str) -> Result<Self, PassError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(PassError::Parse {
                detail: "empty fix response".into(),
            });
        }
        Ok(Self {
            text: text.to_string(),
        })
    }
}

/// Result of the classification pass.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationResult {
    pub content_type: ContentType,
}

impl ClassificationResult {
    /// Parse a label response. Unrecognized labels map to
    /// [`ContentType::Other`] rather than failing — the enum is closed and
    /// the label is advisory.
    pub fn parse(raw: &str) -> Self {
        // Models occasionally wrap the label in prose; take the first word.
        let label = raw.split_whitespace().next().unwrap_or("");
        let label = label.trim_matches(|c: char| !c.is_alphanumeric());
        Self {
            content_type: ContentType::parse_label(label),
        }
    }
}

/// Result of the keyword-extraction pass: categorized keyword lists.
///
/// Field names match the JSON schema requested in
/// [`crate::prompts::keyword_prompt`]. Every field defaults to empty so a
/// model that omits a category still validates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeywordResult {
    #[serde(default)]
    pub technical_keywords: Vec<String>,
    #[serde(default)]
    pub research_concepts: Vec<String>,
    #[serde(default)]
    pub chemical_compounds: Vec<String>,
    #[serde(default)]
    pub methodologies: Vec<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
}

impl KeywordResult {
    /// Parse the strict-JSON keyword response.
    pub fn parse(raw: &str) -> Result<Self, PassError> {
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| PassError::Parse {
            detail: format!("keyword JSON: {e}"),
        })
    }

    /// Flatten categories in fixed order, lower-casing, trimming, and
    /// deduplicating while preserving first-seen order.
    pub fn flatten(self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for list in [
            self.technical_keywords,
            self.research_concepts,
            self.chemical_compounds,
            self.methodologies,
            self.equipment,
        ] {
            for kw in list {
                let kw = kw.trim().to_lowercase();
                if !kw.is_empty() && seen.insert(kw.clone()) {
                    out.push(kw);
                }
            }
        }
        out
    }
}

/// Strip a ```json fence when the model disobeys the strict-output request.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
