//! Error types for the paperdex library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PaperdexError`] — **Fatal**: the document cannot be processed at all
//!   (unreadable PDF, broken knowledge-store transaction, bad configuration).
//!   Returned as `Err(PaperdexError)` from the top-level entry points.
//!
//! * [`PassError`] — **Non-fatal**: a single AI-assisted pass failed for one
//!   page (service down, timeout, malformed JSON). Never escapes the page
//!   pipeline: each pass absorbs it and substitutes its deterministic
//!   fallback, so one bad page degrades quality rather than availability.
//!
//! The separation keeps the partial-failure contract visible in the types: a
//! function returning `Result<_, PassError>` is always called behind a
//! fallback, while a `Result<_, PaperdexError>` is something the caller must
//! actually handle.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the paperdex library.
///
/// Pass-level failures use [`PassError`] and are absorbed inside the page
/// pipeline rather than propagated here.
#[derive(Debug, Error)]
pub enum PaperdexError {
    // ── Document errors ───────────────────────────────────────────────────
    /// The PDF source produced no usable page text.
    #[error("Cannot read document '{path}': {detail}")]
    UnreadableDocument { path: PathBuf, detail: String },

    /// The bibliography file could not be opened or parsed.
    #[error("Cannot read bibliography '{path}': {detail}")]
    BibUnreadable { path: PathBuf, detail: String },

    // ── Store errors ──────────────────────────────────────────────────────
    /// A knowledge-store transaction failed. The index was left in its prior
    /// state; the caller should retry the whole ingest.
    #[error("Knowledge store integrity error: {detail}")]
    StoreIntegrity { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for PaperdexError {
    fn from(e: rusqlite::Error) -> Self {
        PaperdexError::StoreIntegrity {
            detail: e.to_string(),
        }
    }
}

/// A non-fatal error for a single AI-assisted pass.
///
/// Produced by [`crate::ai::TextGenerator::generate`] and consumed by the
/// page pipeline, which maps it to the pass's fallback output. Batch
/// processing continues regardless of how many passes fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PassError {
    /// The inference service is unreachable or timed out.
    #[error("AI service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    /// The service answered, but the structured payload did not validate.
    ///
    /// Not retried: a model that already failed to format correctly is
    /// cheaper to fall back from than to re-query.
    #[error("AI response could not be parsed: {detail}")]
    Parse { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_document_display() {
        let e = PaperdexError::UnreadableDocument {
            path: PathBuf::from("paper.pdf"),
            detail: "no pages".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("paper.pdf"), "got: {msg}");
        assert!(msg.contains("no pages"));
    }

    #[test]
    fn store_integrity_display() {
        let e = PaperdexError::StoreIntegrity {
            detail: "constraint violation".into(),
        };
        assert!(e.to_string().contains("constraint violation"));
    }

    #[test]
    fn pass_error_round_trips_through_serde() {
        let e = PassError::ServiceUnavailable {
            reason: "connection refused".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: PassError = serde_json::from_str(&json).unwrap();
        assert!(back.to_string().contains("connection refused"));
    }

    #[test]
    fn sqlite_errors_map_to_store_integrity() {
        let e: PaperdexError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(e, PaperdexError::StoreIntegrity { .. }));
    }
}
