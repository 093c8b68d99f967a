//! # paperdex
//!
//! Extract text from scientific PDFs, enhance it with a local language model,
//! and index the results into a searchable knowledge store.
//!
//! ## Why this crate?
//!
//! Raw PDF text extraction produces words glued together, broken hyphenation,
//! and no structure. Instead of trying to repair that with layout analysis,
//! this crate runs each page through a local inference service (Ollama-style
//! HTTP API) in three passes — cleanup, section classification, keyword
//! extraction — and degrades gracefully to the raw text whenever the model is
//! unavailable or misbehaves. Extracted keywords feed a SQLite knowledge
//! index that answers search, related-concept, and statistics queries across
//! every document you have processed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Source     per-page raw text via lopdf (spawn_blocking)
//!  ├─ 2. Fix        AI spacing/formatting cleanup + preservation guard
//!  ├─ 3. Classify   abstract / methods / results / … per page
//!  ├─ 4. Keywords   categorized terms as strict JSON, deduplicated
//!  ├─ 5. Assemble   title/author heuristics + bibliography matching
//!  └─ 6. Output     JSON + enhanced Markdown, optional knowledge ingest
//! ```
//!
//! Every AI pass has a deterministic fallback: a document is only ever
//! rejected when its source cannot produce page text at all.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paperdex::{DocumentProcessor, ExtractionConfig, OllamaClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let client = Arc::new(OllamaClient::new(&config)?);
//!     let processor = DocumentProcessor::new(client, config);
//!
//!     let result = processor.process_document("paper.pdf", None).await?;
//!     println!("{} pages, {} keywords", result.pages.len(), result.all_keywords.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paperdex` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! paperdex = { version = "0.4", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod ai;
pub mod batch;
pub mod bib;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod render;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use ai::{GenerateRequest, OllamaClient, TextGenerator};
pub use batch::{run_batch, BatchOptions, BatchSummary, CancelFlag, DocumentReport};
pub use bib::{BibEntry, Bibliography};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{PaperdexError, PassError};
pub use knowledge::{KnowledgeStore, SearchHit, StoreStats};
pub use output::{ContentType, DocumentMetadata, ExtractionResult, PageContent};
pub use process::DocumentProcessor;
pub use progress::BatchProgress;
