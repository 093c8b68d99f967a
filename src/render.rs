//! Derived views of an [`ExtractionResult`] and output-file writing.
//!
//! Both views read the same result object — there is no second data path:
//!
//! - [`to_json`] mirrors `ExtractionResult` exactly (metadata block, ordered
//!   page array, `all_keywords` array) and round-trips through serde.
//! - [`to_markdown`] is the human-readable enhanced-text rendering: document
//!   header, keyword list, then pages grouped by detected content type in
//!   canonical section order.
//!
//! File writes are atomic (write to a `.tmp` sibling, then rename) so a
//! crashed run never leaves a half-written extraction on disk.

use crate::error::PaperdexError;
use crate::output::{ContentType, ExtractionResult};
use std::path::{Path, PathBuf};

/// Serialize the result to pretty JSON.
pub fn to_json(result: &ExtractionResult) -> Result<String, PaperdexError> {
    serde_json::to_string_pretty(result)
        .map_err(|e| PaperdexError::Internal(format!("serialize result: {e}")))
}

/// Render the enhanced-text (Markdown) view.
pub fn to_markdown(result: &ExtractionResult) -> String {
    let meta = &result.metadata;
    let mut lines: Vec<String> = Vec::new();

    let title = if meta.title.is_empty() {
        "Untitled document"
    } else {
        meta.title.as_str()
    };
    lines.push(format!("# {title}"));
    lines.push(String::new());
    lines.push("## Document Information".to_string());
    lines.push(String::new());
    if let Some(ref cite_key) = meta.cite_key {
        lines.push(format!("**Citation Key:** `{cite_key}`  "));
    }
    let authors = if meta.authors.is_empty() {
        "Unknown".to_string()
    } else {
        meta.authors.join(", ")
    };
    lines.push(format!("**Authors:** {authors}  "));
    lines.push(format!("**Pages:** {}  ", meta.page_count));
    lines.push(format!("**Model:** {}  ", meta.model_used));
    lines.push(format!("**Processed:** {}  ", meta.extracted_at));
    lines.push(String::new());

    if !result.all_keywords.is_empty() {
        lines.push("## Keywords".to_string());
        lines.push(String::new());
        let shown: Vec<&str> = result.all_keywords.iter().take(15).map(String::as_str).collect();
        lines.push(format!("{}  ", shown.join(", ")));
        lines.push(String::new());
    }

    if let Some(ref summary) = result.summary {
        lines.push("## Summary".to_string());
        lines.push(String::new());
        lines.push(summary.clone());
        lines.push(String::new());
    }

    lines.push("---".to_string());
    lines.push(String::new());

    for section in ContentType::SECTION_ORDER {
        let pages: Vec<_> = result
            .pages
            .iter()
            .filter(|p| p.content_type == section)
            .collect();
        if pages.is_empty() {
            continue;
        }

        lines.push(format!("## {}", section_heading(section)));
        lines.push(String::new());
        for page in pages {
            lines.push(format!("### Page {}", page.page_number));
            lines.push(String::new());
            lines.push(page.cleaned_text.clone());
            lines.push(String::new());
        }
    }

    let mut out = lines.join("\n");
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn section_heading(section: ContentType) -> &'static str {
    match section {
        ContentType::Abstract => "Abstract",
        ContentType::Introduction => "Introduction",
        ContentType::Methods => "Methods",
        ContentType::Results => "Results",
        ContentType::Discussion => "Discussion",
        ContentType::Conclusion => "Conclusion",
        ContentType::References => "References",
        ContentType::Other => "Other Content",
    }
}

/// Paths of the files written by [`save_results`].
#[derive(Debug, Clone)]
pub struct SavedFiles {
    pub extraction: PathBuf,
    pub markdown: PathBuf,
    pub keywords: PathBuf,
}

/// Write the three output files for one document:
/// `<stem>_extraction.json`, `<stem>_enhanced.md`, `<stem>_keywords.json`.
pub async fn save_results(
    result: &ExtractionResult,
    output_dir: impl AsRef<Path>,
    stem: &str,
) -> Result<SavedFiles, PaperdexError> {
    let dir = output_dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PaperdexError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let extraction = dir.join(format!("{stem}_extraction.json"));
    write_atomic(&extraction, &to_json(result)?).await?;

    let markdown = dir.join(format!("{stem}_enhanced.md"));
    write_atomic(&markdown, &to_markdown(result)).await?;

    let keywords_payload = serde_json::json!({
        "cite_key": result.metadata.cite_key,
        "title": result.metadata.title,
        "keywords": result.all_keywords,
        "extracted_at": result.metadata.extracted_at,
    });
    let keywords = dir.join(format!("{stem}_keywords.json"));
    let keywords_json = serde_json::to_string_pretty(&keywords_payload)
        .map_err(|e| PaperdexError::Internal(format!("serialize keywords: {e}")))?;
    write_atomic(&keywords, &keywords_json).await?;

    Ok(SavedFiles {
        extraction,
        markdown,
        keywords,
    })
}

/// Atomic write: temp file in the same directory, then rename.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), PaperdexError> {
    let tmp_path = path.with_extension("tmp");
    let wrap = |e: std::io::Error| PaperdexError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    tokio::fs::write(&tmp_path, contents).await.map_err(wrap)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(wrap)?;
    Ok(())
}
