//! Progress-callback trait for batch-processing events.
//!
//! Inject an `Arc<dyn BatchProgress>` into [`crate::batch::run_batch`] to
//! receive real-time events as documents complete.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a progress bar, a log, or a channel without the library
//! knowing anything about how the host application communicates. The trait is
//! `Send + Sync` because documents are processed concurrently.

use std::path::Path;

/// Called by the batch runner as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events for different documents may arrive
/// concurrently from different tasks; implementations must protect shared
/// mutable state accordingly.
pub trait BatchProgress: Send + Sync {
    /// Called once before any document is processed.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called just before a document's pages enter the pipeline.
    fn on_document_start(&self, path: &Path) {
        let _ = path;
    }

    /// Called when a document finishes, however degraded its passes were.
    fn on_document_complete(&self, path: &Path, pages: usize, keywords: usize) {
        let _ = (path, pages, keywords);
    }

    /// Called when a document fails fatally (unreadable source, store error).
    fn on_document_error(&self, path: &Path, error: &str) {
        let _ = (path, error);
    }

    /// Called after the last in-flight document settles.
    fn on_batch_complete(&self, completed: usize, failed: usize, skipped: usize) {
        let _ = (completed, failed, skipped);
    }
}
