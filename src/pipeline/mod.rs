//! Pipeline stages for TU-format review.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//!                                ┌─▶ segment ──┐
//! input ──▶ extract ──▶ llm ─────┤             ├──▶ categorize ──▶ summary
//! (path/URL) (pdfium)  (model)   └─▶ batch ────┘    (rule policy)   (report text)
//! ```
//!
//! 1. [`input`]      resolve a path, URL or uploaded bytes to a local PDF
//! 2. [`extract`]    page texts via pdfium, inside `spawn_blocking`
//! 3. [`llm`]        one call per page (bounded concurrency) or one batch call
//! 4. [`segment`]    per-page reply → violation lines
//! 5. [`batch`]      batch reply → per-page sections, three-strategy cascade
//! 6. [`categorize`] ordered rule table → one category per violation
//! 7. [`summary`]    fixed-template report text

pub mod batch;
pub mod categorize;
pub mod extract;
pub mod input;
pub mod llm;
pub mod segment;
pub mod summary;
