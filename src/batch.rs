//! Batch processing: many documents, bounded concurrency, cooperative
//! cancellation.
//!
//! Documents are independent, so they run concurrently via
//! `buffer_unordered`; pages *within* a document stay sequential (see
//! [`crate::process`]). The shared AI client's semaphore keeps total
//! in-flight inference requests bounded no matter how many documents are in
//! flight.
//!
//! ## Cancellation
//!
//! A raised [`CancelFlag`] stops new documents from starting; documents
//! already in flight run to completion and persist their (possibly degraded)
//! results. Partial work is never discarded.
//!
//! ## Failure semantics
//!
//! A fatally failed document (unreadable PDF, store error) is reported by
//! identifier and reason in the [`BatchSummary`] and never stops the rest of
//! the batch.

use crate::bib::Bibliography;
use crate::error::PaperdexError;
use crate::knowledge::KnowledgeStore;
use crate::process::DocumentProcessor;
use crate::progress::BatchProgress;
use crate::render::{self, SavedFiles};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Shared cancellation flag. Raise with [`CancelFlag::cancel`]; the batch
/// runner checks it before starting each document.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Where output files are written.
    pub output_dir: PathBuf,
    /// Documents processed concurrently.
    pub concurrency: usize,
}

/// Successful per-document outcome.
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub saved: SavedFiles,
    pub pages: usize,
    pub keywords: usize,
    pub processing_time: f64,
}

/// Aggregated results of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub completed: Vec<DocumentReport>,
    /// Failed documents with their reasons, in completion order.
    pub failed: Vec<(PathBuf, String)>,
    /// Documents never started because the batch was cancelled.
    pub skipped: usize,
}

/// Process a set of documents, writing outputs (and optionally updating the
/// knowledge index) as each one finishes.
pub async fn run_batch(
    processor: Arc<DocumentProcessor>,
    paths: Vec<PathBuf>,
    bibliography: Option<Arc<Bibliography>>,
    store: Option<Arc<KnowledgeStore>>,
    options: BatchOptions,
    cancel: CancelFlag,
    progress: Option<Arc<dyn BatchProgress>>,
) -> BatchSummary {
    let total = paths.len();
    if let Some(ref cb) = progress {
        cb.on_batch_start(total);
    }

    let concurrency = options.concurrency.max(1);
    let output_dir = Arc::new(options.output_dir);

    let outcomes: Vec<Outcome> = stream::iter(paths.into_iter().map(|path| {
        let processor = Arc::clone(&processor);
        let bibliography = bibliography.clone();
        let store = store.clone();
        let output_dir = Arc::clone(&output_dir);
        let cancel = cancel.clone();
        let progress = progress.clone();

        async move {
            if cancel.is_cancelled() {
                return Outcome::Skipped;
            }
            if let Some(ref cb) = progress {
                cb.on_document_start(&path);
            }

            match process_one(&processor, &path, bibliography.as_deref(), store.as_deref(), &output_dir)
                .await
            {
                Ok(report) => {
                    if let Some(ref cb) = progress {
                        cb.on_document_complete(&path, report.pages, report.keywords);
                    }
                    Outcome::Completed(report)
                }
                Err(e) => {
                    let reason = e.to_string();
                    warn!(document = %path.display(), "document failed: {reason}");
                    if let Some(ref cb) = progress {
                        cb.on_document_error(&path, &reason);
                    }
                    Outcome::Failed(path, reason)
                }
            }
        }
    }))
    .buffer_unordered(concurrency)
    .collect()
    .await;

    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Completed(report) => summary.completed.push(report),
            Outcome::Failed(path, reason) => summary.failed.push((path, reason)),
            Outcome::Skipped => summary.skipped += 1,
        }
    }

    if let Some(ref cb) = progress {
        cb.on_batch_complete(
            summary.completed.len(),
            summary.failed.len(),
            summary.skipped,
        );
    }
    summary
}

enum Outcome {
    Completed(DocumentReport),
    Failed(PathBuf, String),
    Skipped,
}

/// Extract one document, write its outputs, and update the knowledge index.
async fn process_one(
    processor: &DocumentProcessor,
    path: &Path,
    bibliography: Option<&Bibliography>,
    store: Option<&KnowledgeStore>,
    output_dir: &Path,
) -> Result<DocumentReport, PaperdexError> {
    let result = processor.process_document(path, bibliography).await?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let saved = render::save_results(&result, output_dir, &stem).await?;

    if let Some(store) = store {
        store.ingest(
            &result,
            &path.display().to_string(),
            processor.config().context_snippet_chars,
        )?;
    }

    Ok(DocumentReport {
        path: path.to_path_buf(),
        saved,
        pages: result.pages.len(),
        keywords: result.all_keywords.len(),
        processing_time: result.metadata.processing_time,
    })
}
