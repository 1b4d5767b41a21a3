//! Eager (whole-document) analysis entry points.
//!
//! These wait for every model call and return one [`AnalysisReport`]. Use
//! [`crate::stream::analyze_stream`] to receive per-page analyses as they
//! complete instead.

use crate::config::{AnalysisMode, ReviewConfig};
use crate::error::ReviewError;
use crate::output::{AnalysisReport, AnalysisStats, DocumentInfo, Page, PageAnalysis};
use crate::pipeline::batch::{self, Candidate};
use crate::pipeline::extract::{PageTextSource, PdfiumTextSource};
use crate::pipeline::llm::{self, ModelRequest, ModelResponder};
use crate::pipeline::{input, summary};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Analyse a PDF file or URL for TU-format violations.
///
/// The analysis mode (per-page or batch) comes from `config.mode`.
///
/// # Returns
/// `Ok(AnalysisReport)` even if some per-page calls failed; those pages are
/// listed with `ok = false` and contribute no violations.
///
/// # Errors
/// Only fatal problems: missing or non-PDF input, unreadable PDF, empty
/// selection, unconfigured provider, or a failed batch call.
pub async fn analyze(
    input_str: impl AsRef<str>,
    config: &ReviewConfig,
) -> Result<AnalysisReport, ReviewError> {
    let input_str = input_str.as_ref();
    info!("Starting analysis: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    analyze_with_source(resolved.path(), &PdfiumTextSource, config).await
}

/// Analyse uploaded PDF bytes.
///
/// The bytes are spooled to a temp file that is removed on return.
pub async fn analyze_from_bytes(
    bytes: &[u8],
    config: &ReviewConfig,
) -> Result<AnalysisReport, ReviewError> {
    let resolved = input::spool_bytes(bytes)?;
    analyze_with_source(resolved.path(), &PdfiumTextSource, config).await
}

/// Analyse a local PDF using a caller-supplied text source.
pub async fn analyze_with_source(
    pdf_path: &Path,
    source: &dyn PageTextSource,
    config: &ReviewConfig,
) -> Result<AnalysisReport, ReviewError> {
    let total_start = Instant::now();

    let extract_start = Instant::now();
    let pages = source.extract(pdf_path, config.password.as_deref()).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    let document_pages = pages.len();
    info!("PDF has {} pages", document_pages);

    let selected = select_pages(pages, config)?;

    let mut report = match config.mode {
        AnalysisMode::PerPage => analyze_pages(&selected, config).await?,
        AnalysisMode::Batch => analyze_batch_pages(&selected, config).await?,
    };
    report.stats.document_pages = document_pages;
    report.stats.extract_duration_ms = extract_duration_ms;
    report.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(report)
}

/// Apply the page selection, then the page limit.
pub fn select_pages(pages: Vec<Page>, config: &ReviewConfig) -> Result<Vec<Page>, ReviewError> {
    let total = pages.len();
    if total == 0 {
        return Err(ReviewError::NoPages);
    }

    let indices = config.selected_indices(total);
    if indices.is_empty() {
        return Err(ReviewError::PageOutOfRange { page: 0, total });
    }

    let requested = config.pages.to_indices(total).len();
    if indices.len() < requested {
        info!(
            "Page limit applied: analysing {} of {} pages",
            indices.len(),
            requested
        );
    }

    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| indices.binary_search(idx).is_ok())
        .map(|(_, page)| page)
        .collect())
}

/// Per-page analysis of already-extracted pages, all of them.
///
/// Calls run concurrently up to `config.concurrency`; results are put back
/// in page order regardless of completion order.
pub async fn analyze_pages(
    pages: &[Page],
    config: &ReviewConfig,
) -> Result<AnalysisReport, ReviewError> {
    if pages.is_empty() {
        return Err(ReviewError::NoPages);
    }
    let start = Instant::now();
    let responder = llm::resolve_responder(config)?;
    let total = pages.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_start(total);
    }

    let mut results: Vec<PageAnalysis> = stream::iter(
        pages
            .iter()
            .map(|page| analyze_page_with_events(&responder, page, total, config)),
    )
    .buffer_unordered(config.concurrency)
    .collect()
    .await;
    results.sort_by_key(|r| r.page.number());
    let model_duration_ms = start.elapsed().as_millis() as u64;

    let failed = results.iter().filter(|r| !r.ok).count();
    if failed > 0 {
        warn!("{} of {} pages failed and are excluded from the report", failed, total);
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_complete(total, total - failed);
    }

    let policy = &config.phase_policy;
    let categorized = policy.categorize_all(results.iter().filter(|r| r.ok).flat_map(|r| {
        r.violations
            .iter()
            .map(move |line| (r.page.clone(), Candidate::untagged(line.as_str())))
    }));
    let total_issues = categorized.total();
    info!("Analysis complete: {} pages, {} issues", total, total_issues);

    Ok(AnalysisReport {
        mode: AnalysisMode::PerPage,
        summary_text: summary::build_summary(policy.taxonomy(), total, &categorized),
        total_pages: total,
        total_issues,
        phase_summary: summary::phase_summary(&categorized),
        categorized,
        per_page_results: results,
        stats: AnalysisStats {
            document_pages: total,
            pages_selected: total,
            failed_pages: failed,
            extract_duration_ms: 0,
            model_duration_ms,
            total_duration_ms: model_duration_ms,
        },
    })
}

/// Batch analysis of already-extracted pages: one call for all of them.
pub async fn analyze_batch_pages(
    pages: &[Page],
    config: &ReviewConfig,
) -> Result<AnalysisReport, ReviewError> {
    if pages.is_empty() {
        return Err(ReviewError::NoPages);
    }
    let start = Instant::now();
    let responder = llm::resolve_responder(config)?;
    let total = pages.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_start(total);
    }

    let prompt = config.templates.batch_prompt(pages, config.batch_text_limit);
    let request = ModelRequest::for_batch(config, total);
    info!("Sending batch analysis request for {} pages", total);

    let reply = match responder.respond(&prompt, &request).await {
        Ok(reply) => reply,
        Err(source) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_analysis_complete(total, 0);
            }
            return Err(ReviewError::BatchCallFailed {
                pages: total,
                source,
            });
        }
    };
    let model_duration_ms = start.elapsed().as_millis() as u64;
    debug!("Batch reply: {}", reply);

    let parse = batch::parse_batch_reply(&reply);
    let policy = &config.bucket_policy;
    let mut categorized = policy.categorize_all(parse.sections.iter().flat_map(|section| {
        section
            .candidates
            .iter()
            .map(move |c| (section.page.clone(), c.clone()))
    }));
    if !parse.sections.is_empty() {
        policy.apply_limits(&mut categorized);
    }

    let per_page_results: Vec<PageAnalysis> = parse
        .sections
        .iter()
        .map(|section| PageAnalysis {
            page: section.page.clone(),
            raw_analysis: section.raw_analysis(),
            ok: true,
            violations: section.candidates.iter().map(Candidate::display).collect(),
            error: None,
            duration_ms: 0,
        })
        .collect();

    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_complete(total, total);
    }

    let analysed = per_page_results.len();
    let total_issues = categorized.total();
    info!(
        "Batch analysis complete: {} page sections, {} issues",
        analysed, total_issues
    );

    Ok(AnalysisReport {
        mode: AnalysisMode::Batch,
        summary_text: summary::build_summary(policy.taxonomy(), analysed, &categorized),
        total_pages: analysed,
        total_issues,
        phase_summary: None,
        categorized,
        per_page_results,
        stats: AnalysisStats {
            document_pages: total,
            pages_selected: total,
            failed_pages: 0,
            extract_duration_ms: 0,
            model_duration_ms,
            total_duration_ms: model_duration_ms,
        },
    })
}

/// Analyse a PDF and write the JSON report to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn analyze_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisStats, ReviewError> {
    let report = analyze(input_str, config).await?;
    write_report(&report, output_path.as_ref()).await?;
    Ok(report.stats)
}

/// Serialise a report as pretty JSON, atomically.
pub async fn write_report(report: &AnalysisReport, path: &Path) -> Result<(), ReviewError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| ReviewError::Internal(format!("Failed to serialise report: {e}")))?;
    write_atomic(path, json.as_bytes()).await
}

pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ReviewError> {
    let write_err = |e: std::io::Error| ReviewError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &ReviewConfig,
) -> Result<AnalysisReport, ReviewError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReviewError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input_str, config))
}

/// Count pages and pages with text, without calling the model.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentInfo, ReviewError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    let pages = PdfiumTextSource.extract(resolved.path(), None).await?;
    Ok(document_info(&pages))
}

pub(crate) fn document_info(pages: &[Page]) -> DocumentInfo {
    DocumentInfo {
        page_count: pages.len(),
        pages_with_text: pages.iter().filter(|p| !p.text.trim().is_empty()).count(),
    }
}

/// One per-page call wrapped in progress events.
pub(crate) async fn analyze_page_with_events(
    responder: &Arc<dyn ModelResponder>,
    page: &Page,
    total: usize,
    config: &ReviewConfig,
) -> PageAnalysis {
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page.number, total);
    }
    let analysis = llm::analyze_page(responder, page, config).await;
    if let Some(ref cb) = config.progress_callback {
        match &analysis.error {
            None => cb.on_page_complete(page.number, total, analysis.violations.len()),
            Some(e) => cb.on_page_error(page.number, total, &e.to_string()),
        }
    }
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSelection;

    fn pages(n: usize) -> Vec<Page> {
        (1..=n).map(|i| Page::new(i, format!("page {i}"))).collect()
    }

    #[test]
    fn test_page_limit_applies_after_selection() {
        let config = ReviewConfig::builder()
            .pages(PageSelection::Range(3, 20))
            .max_pages(Some(2))
            .build()
            .unwrap();
        let selected = select_pages(pages(12), &config).unwrap();
        let numbers: Vec<usize> = selected.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![3, 4]);
    }

    #[test]
    fn test_unlimited_keeps_every_page() {
        let config = ReviewConfig::builder().max_pages(None).build().unwrap();
        assert_eq!(select_pages(pages(25), &config).unwrap().len(), 25);
    }

    #[test]
    fn test_empty_document_and_empty_selection_are_fatal() {
        let config = ReviewConfig::default();
        assert!(matches!(select_pages(vec![], &config), Err(ReviewError::NoPages)));

        let config = ReviewConfig::builder()
            .pages(PageSelection::Single(9))
            .build()
            .unwrap();
        assert!(matches!(
            select_pages(pages(3), &config),
            Err(ReviewError::PageOutOfRange { total: 3, .. })
        ));
    }

    #[test]
    fn test_document_info_counts_blank_pages() {
        let mut p = pages(3);
        p[1].text = "  \n".into();
        let info = document_info(&p);
        assert_eq!(info.page_count, 3);
        assert_eq!(info.pages_with_text, 2);
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.json");
        write_atomic(&path, b"{}").await.unwrap();
        write_atomic(&path, b"{\"a\":1}").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\":1}");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
