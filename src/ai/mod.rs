//! AI client: the only module with network I/O.
//!
//! [`client`] defines the [`TextGenerator`] seam the rest of the pipeline is
//! written against, plus the [`OllamaClient`] implementation that talks to a
//! local inference service over HTTP. [`response`] holds the validated
//! per-pass result types — the page pipeline never touches raw model output.
//!
//! The trait boundary exists for one reason: every pipeline test can inject a
//! scripted generator instead of a live service, so the partial-failure
//! contract is testable without a model.

pub mod client;
pub mod response;

pub use client::{GenerateRequest, OllamaClient, TextGenerator};
pub use response::{ClassificationResult, KeywordResult, TextFixResult};
