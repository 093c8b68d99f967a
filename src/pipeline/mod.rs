//! Per-page processing stages.
//!
//! Each submodule implements exactly one concern. Keeping stages separate
//! makes each independently testable and lets us tune the guard or the pass
//! order without touching the other.
//!
//! ## Data Flow
//!
//! ```text
//! raw page text ──▶ text-fix ──▶ classify ──▶ keywords ──▶ PageContent
//!                   (AI+guard)   (AI)         (AI, JSON)
//! ```
//!
//! 1. [`page`]     — drives the strictly ordered pass sequence, substituting
//!    deterministic fallbacks so no AI failure escapes a page
//! 2. [`preserve`] — the content-preservation guard that decides whether an
//!    AI fix may replace the raw text

pub mod page;
pub mod preserve;
