//! Output data model: page records, document metadata, and the final
//! extraction result.
//!
//! Everything here is plain serde data. The JSON written by
//! [`crate::render::to_json`] mirrors these structs exactly — metadata block,
//! ordered page array, `all_keywords` array — so downstream consumers can
//! deserialize straight back into [`ExtractionResult`].
//!
//! All three types are immutable once produced: the page pipeline builds each
//! [`PageContent`], the document processor assembles the rest, and nothing
//! mutates them afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Section type detected for a page.
///
/// Any label the model produces outside this set maps to [`ContentType::Other`]
/// — the classifier output is advisory, never trusted to extend the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Abstract,
    Introduction,
    Methods,
    Results,
    Discussion,
    Conclusion,
    References,
    #[default]
    Other,
}

impl ContentType {
    /// Parse a model-produced label, case-insensitively.
    ///
    /// Unrecognized labels (including the model's occasional prose around the
    /// label) collapse to `Other`.
    pub fn parse_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "abstract" => ContentType::Abstract,
            "introduction" => ContentType::Introduction,
            "methods" => ContentType::Methods,
            "results" => ContentType::Results,
            "discussion" => ContentType::Discussion,
            "conclusion" => ContentType::Conclusion,
            "references" => ContentType::References,
            _ => ContentType::Other,
        }
    }

    /// Canonical rendering order for the Markdown view.
    pub const SECTION_ORDER: [ContentType; 8] = [
        ContentType::Abstract,
        ContentType::Introduction,
        ContentType::Methods,
        ContentType::Results,
        ContentType::Discussion,
        ContentType::Conclusion,
        ContentType::References,
        ContentType::Other,
    ];
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContentType::Abstract => "abstract",
            ContentType::Introduction => "introduction",
            ContentType::Methods => "methods",
            ContentType::Results => "results",
            ContentType::Discussion => "discussion",
            ContentType::Conclusion => "conclusion",
            ContentType::References => "references",
            ContentType::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// One processed page.
///
/// Produced by the page pipeline and owned by the parent
/// [`ExtractionResult`]. When every AI pass failed, `cleaned_text` equals
/// `raw_text`, `content_type` is `Other`, and `keywords` is empty — a
/// degraded page, never a missing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContent {
    /// 1-based page number.
    pub page_number: usize,
    /// Text exactly as the PDF source produced it.
    pub raw_text: String,
    /// AI-corrected text, or `raw_text` when the fix pass fell back.
    pub cleaned_text: String,
    /// Detected section type.
    pub content_type: ContentType,
    /// Relevance-ranked keywords: lower-cased, trimmed, deduplicated within
    /// the page preserving first-seen order.
    pub keywords: Vec<String>,
}

/// Document-level metadata, assembled once after all pages are processed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Title derived from page-1 heuristics, possibly replaced by the matched
    /// bibliography entry.
    pub title: String,
    /// Ordered author list.
    pub authors: Vec<String>,
    /// Citation key from the matched bibliography entry; `None` when no entry
    /// cleared the similarity threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cite_key: Option<String>,
    /// Aggregated keywords (same contents as `ExtractionResult::all_keywords`).
    pub keywords: Vec<String>,
    /// Number of pages in the source document.
    pub page_count: usize,
    /// Wall-clock duration of the whole extraction, in seconds. Recorded even
    /// when every AI pass fell back.
    pub processing_time: f64,
    /// Model identifier the AI client was configured with.
    pub model_used: String,
    /// RFC 3339 timestamp taken when the result was assembled.
    pub extracted_at: String,
    /// The matched bibliography entry, when one cleared the threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bib_context: Option<crate::bib::BibEntry>,
}

/// The complete, immutable result of processing one document.
///
/// This is the unit persisted to output files and handed to the knowledge
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub metadata: DocumentMetadata,
    /// Pages in page order.
    pub pages: Vec<PageContent>,
    /// Deduplicated union of all pages' keywords, ordered by first occurrence
    /// across pages in page order.
    pub all_keywords: Vec<String>,
    /// AI-generated document summary; `None` when the pass was disabled or
    /// fell back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ExtractionResult {
    /// Assemble the result, computing `all_keywords` from the pages.
    ///
    /// `metadata.keywords` is overwritten with the aggregate so the two views
    /// can never disagree.
    pub fn new(
        mut metadata: DocumentMetadata,
        pages: Vec<PageContent>,
        summary: Option<String>,
    ) -> Self {
        let all_keywords = aggregate_keywords(&pages);
        metadata.keywords = all_keywords.clone();
        metadata.page_count = pages.len();
        Self {
            metadata,
            pages,
            all_keywords,
            summary,
        }
    }
}

/// Deduplicated ordered union of page keywords.
///
/// First occurrence wins; order follows page order, then within-page order.
pub fn aggregate_keywords(pages: &[PageContent]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for page in pages {
        for kw in &page.keywords {
            if seen.insert(kw.clone()) {
                out.push(kw.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize, keywords: &[&str]) -> PageContent {
        PageContent {
            page_number: n,
            raw_text: String::new(),
            cleaned_text: String::new(),
            content_type: ContentType::Other,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn aggregate_dedups_preserving_first_occurrence_order() {
        let pages = vec![page(1, &["a", "b"]), page(2, &["b", "c"])];
        assert_eq!(aggregate_keywords(&pages), vec!["a", "b", "c"]);
    }

    #[test]
    fn new_mirrors_aggregate_into_metadata() {
        let pages = vec![page(1, &["catalysis"]), page(2, &["catalysis", "nox"])];
        let result = ExtractionResult::new(DocumentMetadata::default(), pages, None);
        assert_eq!(result.all_keywords, vec!["catalysis", "nox"]);
        assert_eq!(result.metadata.keywords, result.all_keywords);
        assert_eq!(result.metadata.page_count, 2);
    }

    #[test]
    fn unknown_labels_map_to_other() {
        assert_eq!(ContentType::parse_label("Methods"), ContentType::Methods);
        assert_eq!(ContentType::parse_label("  RESULTS "), ContentType::Results);
        assert_eq!(ContentType::parse_label("appendix"), ContentType::Other);
        assert_eq!(ContentType::parse_label("main"), ContentType::Other);
        assert_eq!(ContentType::parse_label(""), ContentType::Other);
    }

    #[test]
    fn content_type_serializes_lowercase() {
        let json = serde_json::to_string(&ContentType::Abstract).unwrap();
        assert_eq!(json, "\"abstract\"");
    }

    #[test]
    fn result_json_round_trips() {
        let pages = vec![page(1, &["a"])];
        let result = ExtractionResult::new(DocumentMetadata::default(), pages, Some("s".into()));
        let json = serde_json::to_string(&result).unwrap();
        let back: ExtractionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.all_keywords, vec!["a"]);
        assert_eq!(back.summary.as_deref(), Some("s"));
    }
}
