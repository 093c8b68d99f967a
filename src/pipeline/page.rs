//! Per-page pass orchestration.
//!
//! Each page walks a fixed sequence — text-fix, classify, keyword-extract —
//! and always reaches the end. A failing pass contributes its deterministic
//! fallback instead of an error:
//!
//! | Pass      | Fallback                      |
//! |-----------|-------------------------------|
//! | text-fix  | the raw page text             |
//! | classify  | [`ContentType::Other`]        |
//! | keywords  | empty list                    |
//!
//! This is the partial-failure contract for the whole system: a page is
//! degraded, never missing, and nothing here returns `Err` to the document
//! processor.

use crate::ai::{ClassificationResult, GenerateRequest, KeywordResult, TextFixResult, TextGenerator};
use crate::config::ExtractionConfig;
use crate::output::{ContentType, PageContent};
use crate::pipeline::preserve;
use crate::prompts;
use tracing::debug;

/// Position of a page within its document, passed to the classifier because
/// position carries signal (first page → abstract/introduction, last pages →
/// references).
#[derive(Debug, Clone, Copy)]
pub struct PagePosition {
    /// 1-based page number.
    pub number: usize,
    /// Total pages in the document.
    pub total: usize,
}

/// Run all passes for one page and return the finished [`PageContent`].
///
/// Infallible by design: every AI failure is absorbed into the pass
/// fallbacks. Empty or whitespace-only pages skip the service entirely.
pub async fn process_page(
    client: &dyn TextGenerator,
    config: &ExtractionConfig,
    position: PagePosition,
    raw_text: String,
) -> PageContent {
    if raw_text.trim().is_empty() {
        return PageContent {
            page_number: position.number,
            cleaned_text: raw_text.clone(),
            raw_text,
            content_type: ContentType::Other,
            keywords: Vec::new(),
        };
    }

    let cleaned_text = text_fix_pass(client, config, position, &raw_text).await;
    let content_type = classify_pass(client, config, position, &cleaned_text).await;
    let keywords = keyword_pass(client, config, position, &cleaned_text).await;

    PageContent {
        page_number: position.number,
        raw_text,
        cleaned_text,
        content_type,
        keywords,
    }
}

/// Text-fix pass. Returns the corrected text, or the raw text when the
/// service fails, the response does not validate, or the preservation guard
/// rejects the output.
async fn text_fix_pass(
    client: &dyn TextGenerator,
    config: &ExtractionConfig,
    position: PagePosition,
    raw: &str,
) -> String {
    let request = GenerateRequest {
        prompt: prompts::text_fix_prompt(raw),
        system: prompts::TEXT_FIX_SYSTEM.to_string(),
        json_format: false,
    };

    let fixed = match client.generate(request).await {
        Ok(raw_response) => match TextFixResult::parse(&raw_response) {
            Ok(result) => result.text,
            Err(e) => {
                debug!(page = position.number, "fix response invalid, keeping raw text: {e}");
                return raw.to_string();
            }
        },
        Err(e) => {
            debug!(page = position.number, "fix pass failed, keeping raw text: {e}");
            return raw.to_string();
        }
    };

    if preserve::fix_is_acceptable(raw, &fixed, config.shrink_tolerance) {
        fixed
    } else {
        debug!(
            page = position.number,
            "fix output rejected by preservation guard, keeping raw text"
        );
        raw.to_string()
    }
}

/// Classification pass. Unrecognized labels and any failure map to `Other`.
async fn classify_pass(
    client: &dyn TextGenerator,
    config: &ExtractionConfig,
    position: PagePosition,
    cleaned: &str,
) -> ContentType {
    let excerpt = truncate_chars(cleaned, config.classify_prompt_chars);
    let request = GenerateRequest {
        prompt: prompts::classify_prompt(excerpt, position.number, position.total),
        system: prompts::CLASSIFY_SYSTEM.to_string(),
        json_format: false,
    };

    match client.generate(request).await {
        Ok(raw_response) => ClassificationResult::parse(&raw_response).content_type,
        Err(e) => {
            debug!(page = position.number, "classify pass failed, defaulting to other: {e}");
            ContentType::Other
        }
    }
}

/// Keyword-extraction pass. Any failure yields an empty keyword list.
async fn keyword_pass(
    client: &dyn TextGenerator,
    config: &ExtractionConfig,
    position: PagePosition,
    cleaned: &str,
) -> Vec<String> {
    let excerpt = truncate_chars(cleaned, config.keyword_prompt_chars);
    let request = GenerateRequest {
        prompt: prompts::keyword_prompt(excerpt),
        system: prompts::KEYWORD_SYSTEM.to_string(),
        json_format: true,
    };

    match client.generate(request).await {
        Ok(raw_response) => match KeywordResult::parse(&raw_response) {
            Ok(result) => result.flatten(),
            Err(e) => {
                debug!(page = position.number, "keyword response invalid, using empty set: {e}");
                Vec::new()
            }
        },
        Err(e) => {
            debug!(page = position.number, "keyword pass failed, using empty set: {e}");
            Vec::new()
        }
    }
}

/// Truncate on a char boundary for prompt embedding.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate_chars("αβγ", 2), "αβ");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
