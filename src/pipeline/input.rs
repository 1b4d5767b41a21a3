//! Input resolution: turn a path, URL or uploaded bytes into a local PDF.
//!
//! pdfium needs a file-system path. Downloads and in-memory uploads are
//! written to a temp location owned by [`ResolvedInput`], so cleanup
//! happens when it is dropped. The `%PDF` magic is checked up front so a
//! wrong upload is reported as such rather than as a pdfium failure.

use crate::error::ReviewError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF on local disk, possibly owned by a temp location.
pub enum ResolvedInput {
    /// The caller's own file.
    Local(PathBuf),
    /// Downloaded from a URL into a temp directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
    /// In-memory bytes spilled to a temp file.
    Spooled(NamedTempFile),
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
            ResolvedInput::Spooled(file) => file.path(),
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or HTTP(S) URL to a local PDF file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, ReviewError> {
    if input.trim().is_empty() {
        return Err(ReviewError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Write uploaded PDF bytes to a temp file.
pub fn spool_bytes(bytes: &[u8]) -> Result<ResolvedInput, ReviewError> {
    if bytes.is_empty() {
        return Err(ReviewError::InvalidInput {
            input: "<empty upload>".to_string(),
        });
    }

    let mut tmp = NamedTempFile::new().map_err(|e| ReviewError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| ReviewError::Internal(format!("tempfile write: {e}")))?;
    check_magic(tmp.path(), bytes)?;

    debug!("Spooled {} uploaded bytes to {}", bytes.len(), tmp.path().display());
    Ok(ResolvedInput::Spooled(tmp))
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, ReviewError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ReviewError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != PDF_MAGIC {
                return Err(ReviewError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ReviewError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ReviewError::FileNotFound { path });
        }
    }

    info!("File received: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, ReviewError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ReviewError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ReviewError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ReviewError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ReviewError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| ReviewError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ReviewError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ReviewError::Internal(format!("Failed to write temp file: {}", e)))?;
    check_magic(&file_path, &bytes)?;

    info!("Downloaded {} bytes to {}", bytes.len(), file_path.display());
    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), ReviewError> {
    if bytes.len() >= 4 && &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(ReviewError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// Last path segment of the URL if it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/thesis.pdf"));
        assert!(is_url("http://example.com/thesis.pdf"));
        assert!(!is_url("/tmp/thesis.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_filename_from_url_falls_back() {
        assert_eq!(filename_from_url("https://x.org/a/thesis.pdf"), "thesis.pdf");
        assert_eq!(filename_from_url("https://x.org/download/"), "downloaded.pdf");
        assert_eq!(filename_from_url("not a url"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.err().unwrap();
        assert!(matches!(err, ReviewError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_empty_input_is_invalid() {
        let err = resolve_input("  ", 5).await.err().unwrap();
        assert!(matches!(err, ReviewError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_non_pdf_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"hello world").unwrap();
        let err = resolve_input(path.to_str().unwrap(), 5).await.err().unwrap();
        assert!(matches!(err, ReviewError::NotAPdf { magic, .. } if &magic == b"hell"));
    }

    #[test]
    fn test_spooled_bytes_keep_a_path() {
        let resolved = spool_bytes(b"%PDF-1.7\n%%EOF").unwrap();
        assert!(resolved.path().exists());
        assert!(matches!(spool_bytes(b"GIF89a"), Err(ReviewError::NotAPdf { .. })));
        assert!(matches!(spool_bytes(b""), Err(ReviewError::InvalidInput { .. })));
    }
}
