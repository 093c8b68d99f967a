//! Document processor: drives the page pipeline across a whole document.
//!
//! Pages are processed strictly in page order because later stages consume
//! earlier context — the title detected on page 1 feeds bibliography matching,
//! and the classifier is told each page's position. That context travels in an
//! explicit [`DocumentContext`] value threaded through the loop rather than
//! shared mutable state.
//!
//! ## Failure semantics
//!
//! Total AI unavailability does not abort a document: every page falls back to
//! its raw text with `Other` classification and no keywords, and a
//! degraded-but-valid [`ExtractionResult`] is still produced — downstream
//! consumers (knowledge indexing, output writers) expect a result object for
//! every page-processable document. Only a source that yields zero pages
//! surfaces an error.

use crate::ai::{GenerateRequest, TextGenerator};
use crate::bib::{BibEntry, Bibliography};
use crate::config::ExtractionConfig;
use crate::error::PaperdexError;
use crate::output::{DocumentMetadata, ExtractionResult, PageContent};
use crate::pipeline::page::{process_page, PagePosition};
use crate::prompts;
use crate::source;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Title and author context derived from the first page, threaded through the
/// page loop and into metadata assembly.
#[derive(Debug, Clone, Default)]
pub struct DocumentContext {
    pub title: Option<String>,
    pub authors: Vec<String>,
}

/// Orchestrates extraction for single documents.
///
/// Holds an explicit AI client instance — created once per batch run and
/// shared across documents — instead of any process-wide singleton.
pub struct DocumentProcessor {
    client: Arc<dyn TextGenerator>,
    config: ExtractionConfig,
}

impl DocumentProcessor {
    pub fn new(client: Arc<dyn TextGenerator>, config: ExtractionConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Read a PDF and process it end to end.
    pub async fn process_document(
        &self,
        path: impl AsRef<Path>,
        bibliography: Option<&Bibliography>,
    ) -> Result<ExtractionResult, PaperdexError> {
        let path = path.as_ref();
        let pages = source::read_pages(path).await?;
        self.process_pages(&path.display().to_string(), pages, bibliography)
            .await
    }

    /// Process already-extracted per-page text.
    ///
    /// `label` identifies the document in errors and logs (usually the file
    /// path). The only error is an empty page list — everything the AI can
    /// get wrong degrades instead.
    pub async fn process_pages(
        &self,
        label: &str,
        pages: Vec<String>,
        bibliography: Option<&Bibliography>,
    ) -> Result<ExtractionResult, PaperdexError> {
        let start = Instant::now();

        if pages.is_empty() {
            return Err(PaperdexError::UnreadableDocument {
                path: label.into(),
                detail: "document produced no pages".into(),
            });
        }

        let total = pages.len();
        info!(document = label, pages = total, "starting extraction");

        let mut processed: Vec<PageContent> = Vec::with_capacity(total);
        let mut context = DocumentContext::default();

        for (index, raw_text) in pages.into_iter().enumerate() {
            let position = PagePosition {
                number: index + 1,
                total,
            };
            let page = process_page(self.client.as_ref(), &self.config, position, raw_text).await;

            if index == 0 {
                context = derive_context(&page.cleaned_text);
                debug!(document = label, title = ?context.title, "derived page-1 context");
            }

            processed.push(page);
        }

        // Bibliography matching runs on the derived title; below the
        // threshold the document keeps cite_key = None.
        let bib_entry = match (&context.title, bibliography) {
            (Some(title), Some(bib)) => bib
                .best_match(title, self.config.bib_match_threshold)
                .cloned(),
            _ => None,
        };

        let mut metadata = assemble_metadata(
            &context,
            bib_entry,
            self.client.model().to_string(),
            start.elapsed().as_secs_f64(),
        );
        metadata.keywords = crate::output::aggregate_keywords(&processed);

        let summary = if self.config.generate_summary {
            self.generate_summary(&metadata, &processed).await
        } else {
            None
        };

        // Timing covers the summary pass too, and is recorded even when
        // every AI call fell back.
        metadata.processing_time = start.elapsed().as_secs_f64();
        let result = ExtractionResult::new(metadata, processed, summary);

        info!(
            document = label,
            keywords = result.all_keywords.len(),
            seconds = result.metadata.processing_time,
            "extraction complete"
        );
        Ok(result)
    }

    /// Document-level summary pass. Failure leaves `None` — the summary is a
    /// derived nicety, never load-bearing.
    async fn generate_summary(
        &self,
        metadata: &DocumentMetadata,
        pages: &[PageContent],
    ) -> Option<String> {
        let sample: String = pages
            .iter()
            .take(5)
            .map(|p| p.cleaned_text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let sample: String = sample.chars().take(3000).collect();
        if sample.trim().is_empty() {
            return None;
        }

        let request = GenerateRequest {
            prompt: prompts::summary_prompt(
                &metadata.title,
                &metadata.authors.join(", "),
                &metadata.keywords.join(", "),
                &sample,
            ),
            system: prompts::SUMMARY_SYSTEM.to_string(),
            json_format: false,
        };

        match self.client.generate(request).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                debug!("summary pass failed: {e}");
                None
            }
        }
    }
}

/// Merge heuristic context and an optional bibliography hit into metadata.
///
/// A matched entry wins over the heuristics for title and authors — parsed
/// citation data is cleaner than anything recovered from PDF text.
fn assemble_metadata(
    context: &DocumentContext,
    bib_entry: Option<BibEntry>,
    model_used: String,
    processing_time: f64,
) -> DocumentMetadata {
    let mut metadata = DocumentMetadata {
        title: context.title.clone().unwrap_or_default(),
        authors: context.authors.clone(),
        model_used,
        processing_time,
        extracted_at: chrono::Utc::now().to_rfc3339(),
        ..DocumentMetadata::default()
    };

    if let Some(entry) = bib_entry {
        if !entry.title.is_empty() {
            metadata.title = entry.title.clone();
        }
        if !entry.authors.is_empty() {
            metadata.authors = entry.authors.clone();
        }
        metadata.cite_key = Some(entry.cite_key.clone());
        metadata.bib_context = Some(entry);
    }

    metadata
}

// ── Page-1 heuristics ────────────────────────────────────────────────────

/// Lines that are never a title: DOIs, URLs, ISSNs, submission dates, bare
/// page furniture.
static RE_TITLE_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)doi|https?://|www\.|issn|©|received|accepted|published|vol\.|pp\.")
        .unwrap()
});

/// An author line: capitalised names separated by commas or "and".
static RE_AUTHOR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][\w.\-]+(?:\s+[A-Z][\w.\-]+)+(?:\s*(?:,|and|&)\s*[A-Z][\w.\-]+(?:\s+[A-Z][\w.\-]+)*)+")
        .unwrap()
});

/// Derive title and authors from the first page's cleaned text.
///
/// Deterministic by design — a fast default that bibliography matching can
/// override: the title is the first substantial line that is not journal
/// furniture, and the authors are the first following line that looks like a
/// name list.
pub fn derive_context(first_page: &str) -> DocumentContext {
    let mut context = DocumentContext::default();
    let mut title_line_index = None;

    for (index, line) in first_page.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || RE_TITLE_NOISE.is_match(line) {
            continue;
        }
        if line.split_whitespace().count() >= 4 && line.len() >= 20 {
            context.title = Some(line.to_string());
            title_line_index = Some(index);
            break;
        }
    }

    if let Some(title_index) = title_line_index {
        for line in first_page.lines().skip(title_index + 1).take(6) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if RE_AUTHOR_LINE.is_match(line) {
                context.authors = split_author_line(line);
                break;
            }
        }
    }

    context
}

/// Split "A. Author, B. Author and C. Author" into individual names.
fn split_author_line(line: &str) -> Vec<String> {
    line.split(&[',', '&'][..])
        .flat_map(|part| part.split(" and "))
        .map(|name| name.trim().trim_end_matches(['*', '†', '‡']).trim().to_string())
        .filter(|name| {
            name.len() > 2 && name.chars().next().is_some_and(|c| c.is_uppercase())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST_PAGE: &str = "\
Journal of Catalysis Vol. 12 pp. 1-10
doi:10.1000/j.cat.2021.01

Electrochemical NOx reduction to ammonia on copper catalysts

Wei Chen, John A. Smith and Maria Garcia
Department of Chemistry, Example University

Abstract
We report the selective reduction of NOx...";

    #[test]
    fn derives_title_skipping_journal_furniture() {
        let context = derive_context(FIRST_PAGE);
        assert_eq!(
            context.title.as_deref(),
            Some("Electrochemical NOx reduction to ammonia on copper catalysts")
        );
    }

    #[test]
    fn derives_authors_from_name_line() {
        let context = derive_context(FIRST_PAGE);
        assert_eq!(
            context.authors,
            vec!["Wei Chen", "John A. Smith", "Maria Garcia"]
        );
    }

    #[test]
    fn empty_page_yields_empty_context() {
        let context = derive_context("");
        assert!(context.title.is_none());
        assert!(context.authors.is_empty());
    }

    #[test]
    fn author_splitting_handles_marks_and_ampersands() {
        let authors = split_author_line("Wei Chen*, John A. Smith† & Maria Garcia");
        assert_eq!(authors, vec!["Wei Chen", "John A. Smith", "Maria Garcia"]);
    }
}
