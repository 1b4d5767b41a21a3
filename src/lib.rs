//! # tu-review
//!
//! Review thesis PDFs against TU formatting rules with a language model.
//!
//! Page text is extracted with pdfium and sent to an LLM together with a
//! fixed rubric, either one call per page or one call for the whole
//! document. The model's free-text replies are then split into individual
//! violation lines, classified by an ordered rule table, and assembled into
//! a structured [`AnalysisReport`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file, URL, or uploaded bytes
//!  ├─ 2. Extract    page texts via pdfium (spawn_blocking)
//!  ├─ 3. Model      per-page calls (bounded concurrency) or one batch call
//!  ├─ 4. Segment    replies → violation lines (per-page or batch cascade)
//!  ├─ 5. Categorize rule policy → structure/grammar/enhancement
//!  │                or error/warning/suggestion/idea
//!  └─ 6. Summary    fixed-template report text + per-page results
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tu_review::{analyze, ReviewConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Local ollama with llama3.2:3b unless EDGEQUAKE_* says otherwise
//!     let config = ReviewConfig::default();
//!     let report = analyze("thesis.pdf", &config).await?;
//!     println!("{}", report.summary_text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tu-review` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{
    analyze, analyze_batch_pages, analyze_from_bytes, analyze_pages, analyze_sync,
    analyze_to_file, analyze_with_source, inspect, write_report,
};
pub use config::{AnalysisMode, ConfigEcho, PageSelection, ReviewConfig, ReviewConfigBuilder};
pub use error::{PageError, ResponderError, ReviewError};
pub use output::{
    AnalysisReport, AnalysisStats, CategorizedResult, Category, DocumentInfo, Page, PageAnalysis,
    PageRef, PhaseSummary, ReviewResponse, Taxonomy, Violation,
};
pub use pipeline::categorize::RulePolicy;
pub use pipeline::extract::{PageTextSource, PdfiumTextSource};
pub use pipeline::llm::{ModelRequest, ModelResponder};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::PromptTemplates;
pub use stream::{analyze_stream, stream_pages, AnalysisStream};
