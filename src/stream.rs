//! Streaming analysis API: emit page analyses as their calls complete.
//!
//! Unlike the eager [`crate::analyze::analyze`], which returns only after
//! every page finishes, [`analyze_stream`] yields each page's
//! [`PageAnalysis`] as soon as its model call returns. Pages arrive in
//! completion order; sort by `page` if order matters. Categorisation and
//! the summary need every page, so they are left to the caller (see
//! [`crate::analyze::analyze_pages`]).

use crate::analyze::{analyze_page_with_events, select_pages};
use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::output::{Page, PageAnalysis};
use crate::pipeline::extract::{PageTextSource, PdfiumTextSource};
use crate::pipeline::{input, llm};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-page analyses.
pub type AnalysisStream = Pin<Box<dyn Stream<Item = PageAnalysis> + Send>>;

/// Analyse a PDF file or URL page by page, streaming results.
///
/// Text is extracted and the page selection applied before the stream is
/// returned, so fatal problems surface as `Err` here rather than mid-stream.
/// Failed calls are yielded as `PageAnalysis { ok: false, .. }`.
pub async fn analyze_stream(
    input_str: impl AsRef<str>,
    config: &ReviewConfig,
) -> Result<AnalysisStream, ReviewError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming analysis: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pages = PdfiumTextSource
        .extract(resolved.path(), config.password.as_deref())
        .await?;
    let selected = select_pages(pages, config)?;
    stream_pages(selected, config)
}

/// Stream per-page analyses for already-extracted pages.
///
/// `on_analysis_complete` fires once the last page has been yielded, with the
/// number of successful pages. A stream dropped early never reports completion.
pub fn stream_pages(pages: Vec<Page>, config: &ReviewConfig) -> Result<AnalysisStream, ReviewError> {
    if pages.is_empty() {
        return Err(ReviewError::NoPages);
    }
    let responder = llm::resolve_responder(config)?;
    let total = pages.len();
    let concurrency = config.concurrency;
    let config = Arc::new(config.clone());

    let callback = config.progress_callback.clone();
    if let Some(ref cb) = callback {
        cb.on_analysis_start(total);
    }

    let succeeded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&succeeded);

    let pages = stream::iter(pages.into_iter().map(move |page| {
        let responder = Arc::clone(&responder);
        let cfg = Arc::clone(&config);
        async move { analyze_page_with_events(&responder, &page, total, &cfg).await }
    }))
    .buffer_unordered(concurrency)
    .inspect(move |analysis| {
        if analysis.ok {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });

    let done = stream::once(async move {
        let ok = succeeded.load(Ordering::Relaxed);
        info!("Streaming analysis complete: {}/{} pages succeeded", ok, total);
        if let Some(cb) = callback {
            cb.on_analysis_complete(total, ok);
        }
    })
    .filter_map(|()| async { None::<PageAnalysis> });

    Ok(Box::pin(pages.chain(done)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResponderError;
    use crate::pipeline::llm::{ModelRequest, ModelResponder};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Later pages answer sooner, so completion order is reversed.
    struct Staggered;

    #[async_trait]
    impl ModelResponder for Staggered {
        async fn respond(&self, prompt: &str, _: &ModelRequest) -> Result<String, ResponderError> {
            let delay = if prompt.contains("Page 1 content") { 60 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok("1. Heading format incorrect on this page.".to_string())
        }
    }

    /// Fails page 3, answers the rest.
    struct FailsThird;

    #[async_trait]
    impl ModelResponder for FailsThird {
        async fn respond(&self, prompt: &str, _: &ModelRequest) -> Result<String, ResponderError> {
            if prompt.contains("Page 3 content") {
                Err(ResponderError::Timeout { secs: 60 })
            } else {
                Ok("No TU format violations detected on this page.".to_string())
            }
        }
    }

    #[derive(Default)]
    struct Events {
        started: AtomicUsize,
        completed: AtomicUsize,
        errors: AtomicUsize,
        finished: std::sync::Mutex<Vec<(usize, usize)>>,
    }

    impl crate::progress::AnalysisProgressCallback for Events {
        fn on_analysis_start(&self, _: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_complete(&self, _: usize, _: usize, _: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_error(&self, _: usize, _: usize, _: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_analysis_complete(&self, total_pages: usize, success_count: usize) {
            self.finished.lock().unwrap().push((total_pages, success_count));
        }
    }

    #[tokio::test]
    async fn test_stream_reports_completion_after_last_page() {
        let events = Arc::new(Events::default());
        let config = ReviewConfig::builder()
            .responder(Arc::new(FailsThird))
            .progress_callback(events.clone())
            .build()
            .unwrap();
        let pages = (1..=3).map(|i| Page::new(i, format!("page {i}"))).collect();

        let results: Vec<PageAnalysis> = stream_pages(pages, &config).unwrap().collect().await;
        assert_eq!(results.len(), 3);
        assert_eq!(events.started.load(Ordering::SeqCst), 1);
        assert_eq!(events.completed.load(Ordering::SeqCst), 2);
        assert_eq!(events.errors.load(Ordering::SeqCst), 1);
        assert_eq!(*events.finished.lock().unwrap(), vec![(3, 2)]);
    }

    #[tokio::test]
    async fn test_yields_every_page_in_completion_order() {
        let config = ReviewConfig::builder()
            .responder(Arc::new(Staggered))
            .build()
            .unwrap();
        let pages = vec![Page::new(1, "first"), Page::new(2, "second")];

        let results: Vec<PageAnalysis> = stream_pages(pages, &config).unwrap().collect().await;
        let order: Vec<Option<usize>> = results.iter().map(|r| r.page.number()).collect();
        assert_eq!(order, vec![Some(2), Some(1)]);
        assert!(results.iter().all(|r| r.violations.len() == 1));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let config = ReviewConfig::builder()
            .responder(Arc::new(Staggered))
            .build()
            .unwrap();
        assert!(matches!(stream_pages(vec![], &config), Err(ReviewError::NoPages)));
    }
}
