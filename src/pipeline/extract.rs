//! Page text source: ordered `{number, text}` pages from a PDF on disk.
//!
//! pdfium is a blocking C library, so every call runs inside
//! `tokio::task::spawn_blocking`. The library is bound at runtime: first
//! `PDFIUM_LIB_PATH` if it names an existing file, then the system library.

use crate::error::ReviewError;
use crate::output::Page;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Anything that can turn a PDF file into page texts.
#[async_trait]
pub trait PageTextSource: Send + Sync {
    /// All pages in document order. Page text may be empty.
    async fn extract(&self, path: &Path, password: Option<&str>) -> Result<Vec<Page>, ReviewError>;
}

/// [`PageTextSource`] backed by pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumTextSource;

#[async_trait]
impl PageTextSource for PdfiumTextSource {
    async fn extract(&self, path: &Path, password: Option<&str>) -> Result<Vec<Page>, ReviewError> {
        let path = path.to_path_buf();
        let password = password.map(str::to_string);

        tokio::task::spawn_blocking(move || extract_blocking(&path, password.as_deref()))
            .await
            .map_err(|e| ReviewError::Internal(format!("Extraction task panicked: {}", e)))?
    }
}

fn extract_blocking(pdf_path: &Path, password: Option<&str>) -> Result<Vec<Page>, ReviewError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| load_error(pdf_path, password, e))?;

    let mut pages = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let number = idx + 1;
        let text = page
            .text()
            .map(|t| t.all())
            .map_err(|e| ReviewError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("page {number}: {e:?}"),
            })?;
        debug!("Page {}: {} chars of text", number, text.chars().count());
        pages.push(Page::new(number, text));
    }

    info!("Extracted text from {} pages", pages.len());
    Ok(pages)
}

fn load_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> ReviewError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            ReviewError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            ReviewError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        ReviewError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: err_str,
        }
    }
}

/// Bind to pdfium via `PDFIUM_LIB_PATH`, falling back to the system library.
pub fn bind_pdfium() -> Result<Pdfium, ReviewError> {
    if let Some(path) = env_library_path() {
        debug!("Binding pdfium from {}", path.display());
        return Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| ReviewError::PdfiumBindingFailed(format!("{}: {}", path.display(), e)));
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| ReviewError::PdfiumBindingFailed(e.to_string()))
}

fn env_library_path() -> Option<PathBuf> {
    std::env::var("PDFIUM_LIB_PATH")
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .filter(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_errors_are_classified() {
        let path = Path::new("thesis.pdf");
        let e = load_error(path, None, PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::PasswordError,
        ));
        assert!(matches!(e, ReviewError::PasswordRequired { .. }));

        let e = load_error(path, Some("guess"), PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::PasswordError,
        ));
        assert!(matches!(e, ReviewError::WrongPassword { .. }));
    }

    #[test]
    fn test_other_load_errors_are_corrupt_pdf() {
        let e = load_error(
            Path::new("thesis.pdf"),
            None,
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError),
        );
        assert!(matches!(e, ReviewError::CorruptPdf { .. }));
    }
}
