//! PDF text source.
//!
//! A deliberately thin wrapper over `lopdf`: the pipeline consumes raw
//! per-page text and nothing else, so layout analysis, fonts, and images are
//! out of scope here. `lopdf` is synchronous, so the actual parse runs in
//! `spawn_blocking` to keep it off the async executor's hot path.
//!
//! Failure to open or parse the document is the one fatal, document-level
//! error in the system ([`PaperdexError::UnreadableDocument`]). A single page
//! whose text cannot be decoded degrades to an empty page instead — page
//! count and page order are preserved.

use crate::error::PaperdexError;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Read per-page raw text from a PDF.
///
/// Returns one string per page, in page order. Errors only when the document
/// itself cannot be opened or contains no pages.
pub async fn read_pages(path: impl AsRef<Path>) -> Result<Vec<String>, PaperdexError> {
    let path = path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || read_pages_blocking(&path))
        .await
        .map_err(|e| PaperdexError::Internal(format!("PDF reader task panicked: {e}")))?
}

fn read_pages_blocking(path: &PathBuf) -> Result<Vec<String>, PaperdexError> {
    let doc = lopdf::Document::load(path).map_err(|e| PaperdexError::UnreadableDocument {
        path: path.clone(),
        detail: e.to_string(),
    })?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(PaperdexError::UnreadableDocument {
            path: path.clone(),
            detail: "document contains no pages".into(),
        });
    }

    let pages = page_numbers
        .into_iter()
        .map(|number| match doc.extract_text(&[number]) {
            Ok(text) => clean_page_text(&text),
            Err(e) => {
                warn!(page = number, "text extraction failed, page degraded to empty: {e}");
                String::new()
            }
        })
        .collect();

    Ok(pages)
}

/// Strip common PDF extraction artifacts: NUL bytes, BOMs, trailing
/// whitespace, and runs of blank lines.
pub fn clean_page_text(text: &str) -> String {
    text.replace(['\u{0}', '\u{FEFF}'], "")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_artifacts() {
        let dirty = "Hello\u{0} world\u{FEFF}  \n\n  trailing  ";
        let clean = clean_page_text(dirty);
        assert_eq!(clean, "Hello world\n\n  trailing");
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let err = read_pages("/definitely/not/a/real/file.pdf").await;
        assert!(matches!(
            err,
            Err(PaperdexError::UnreadableDocument { .. })
        ));
    }
}
