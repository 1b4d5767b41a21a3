//! Error types for the tu-review library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ReviewError`]: **Fatal**. The analysis cannot proceed at all
//!   (missing file, unreadable PDF, provider not configured). Returned as
//!   `Err(ReviewError)` from the top-level `analyze*` functions.
//!
//! * [`PageError`]: **Non-fatal**. One page's model call failed but the
//!   other pages are fine. Stored inside [`crate::output::PageAnalysis`] and
//!   excluded from violation aggregation.
//!
//! * [`ResponderError`]: the tagged failure outcome of a single model call.
//!   Keeping it apart from the reply text means a "Connection error: ..."
//!   message can never be segmented as if it were a violation line.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the tu-review library.
#[derive(Debug, Error)]
pub enum ReviewError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}' (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("Error reading PDF '{path}': {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched none of the document's pages.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Nothing to analyse: the document (or the selection) has no pages.
    #[error("No pages to analyse")]
    NoPages,

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider could not be created.
    #[error("LLM provider '{provider}' is not configured: {hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The single batch call failed; there is nothing to segment.
    #[error("Model call covering {pages} pages failed: {source}")]
    BatchCallFailed {
        pages: usize,
        #[source]
        source: ResponderError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output report file.
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

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The provider returned an error or could not be reached.
    #[error("Page {page}: model call failed: {detail}")]
    LlmFailed { page: usize, detail: String },

    /// The model call exceeded its timeout.
    #[error("Page {page}: model call timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

impl PageError {
    /// Attach a page number to a responder failure.
    pub fn from_responder(page: usize, err: &ResponderError) -> Self {
        match err {
            ResponderError::Timeout { secs } => PageError::Timeout { page, secs: *secs },
            ResponderError::Provider(detail) => PageError::LlmFailed {
                page,
                detail: detail.clone(),
            },
        }
    }
}

/// Failure outcome of one model call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResponderError {
    #[error("Analysis timed out after {secs} seconds. The model is taking longer than expected.")]
    Timeout { secs: u64 },

    #[error("Error during analysis: {0}")]
    Provider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_error_from_timeout() {
        let e = PageError::from_responder(4, &ResponderError::Timeout { secs: 60 });
        assert_eq!(e, PageError::Timeout { page: 4, secs: 60 });
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn page_error_from_provider_failure() {
        let e = PageError::from_responder(2, &ResponderError::Provider("refused".into()));
        assert!(e.to_string().contains("Page 2"));
        assert!(e.to_string().contains("refused"));
    }

    #[test]
    fn responder_timeout_is_human_readable() {
        let msg = ResponderError::Timeout { secs: 120 }.to_string();
        assert!(msg.starts_with("Analysis timed out after 120 seconds"), "got: {msg}");
    }

    #[test]
    fn batch_failure_keeps_responder_message() {
        let e = ReviewError::BatchCallFailed {
            pages: 3,
            source: ResponderError::Timeout { secs: 120 },
        };
        assert!(e.to_string().contains("3 pages"));
        assert!(e.to_string().contains("timed out after 120 seconds"));
    }

    #[test]
    fn corrupt_pdf_display() {
        let e = ReviewError::CorruptPdf {
            path: PathBuf::from("report.pdf"),
            detail: "bad xref".into(),
        };
        assert!(e.to_string().contains("report.pdf"));
        assert!(e.to_string().contains("bad xref"));
    }
}
