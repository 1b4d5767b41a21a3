//! Progress-callback trait for per-page analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::ReviewConfigBuilder::progress_callback`] to receive
//! events as pages are analysed. The CLI renders them as a progress bar.
//!
//! # Example
//!
//! ```rust
//! use tu_review::{AnalysisProgressCallback, ReviewConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct IssueCounter {
//!     issues: AtomicUsize,
//! }
//!
//! impl AnalysisProgressCallback for IssueCounter {
//!     fn on_page_complete(&self, _page: usize, _total: usize, violations: usize) {
//!         self.issues.fetch_add(violations, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(IssueCounter { issues: AtomicUsize::new(0) });
//! let config = ReviewConfig::builder()
//!     .progress_callback(counter as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the analysis pipeline as it processes each page.
///
/// In per-page mode the page methods may be called concurrently from
/// different tasks, so implementations must synchronise shared state.
/// In batch mode only the start/complete pair fires, around the single call.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once before any model call, with the number of selected pages.
    fn on_analysis_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page's model request is sent.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page's reply has been segmented.
    ///
    /// `violations` is the number of candidate violation lines found.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, violations: usize) {
        let _ = (page_num, total_pages, violations);
    }

    /// Called when a page's model call fails.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has been attempted.
    fn on_analysis_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReviewConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
