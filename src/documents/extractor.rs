//! PDF Text Extraction
//!
//! Per-page plain text from a PDF, in page order.

use lopdf::Document;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Pdf(String),
    #[error("No text found in document")]
    NoText,
}

impl From<lopdf::Error> for ExtractError {
    fn from(e: lopdf::Error) -> Self {
        ExtractError::Pdf(e.to_string())
    }
}

impl ExtractError {
    /// Short banner shown to the user
    pub fn user_message(&self) -> String {
        match self {
            ExtractError::NoText => {
                "Geen tekst gevonden in het document, controleer of de pdf goed is geladen.".to_string()
            }
            ExtractError::Io(e) => format!("Fout bij het openen van het document: {}", e),
            ExtractError::Pdf(e) => format!("Het document kon niet worden gelezen: {}", e),
        }
    }
}

/// Extract the text of every page that has any, in page order.
///
/// Pages without text (scans, images, blank pages) are left out rather than
/// kept as empty strings, and so are pages whose text extraction fails.
/// Returns [`ExtractError::NoText`] when no page has any non-whitespace text.
pub fn extract_text_from_pdf_by_page(path: &Path) -> Result<Vec<String>, ExtractError> {
    let document = {
        let file = File::open(path)?;
        Document::load_from(BufReader::new(file))?
    };

    let pages = document.get_pages();
    let page_count = pages.len();
    let mut pages_text = Vec::with_capacity(page_count);

    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) if !text.trim().is_empty() => pages_text.push(text),
            Ok(_) => debug!(page = page_number, "Page has no text"),
            Err(e) => warn!(page = page_number, error = %e, "Page text extraction failed"),
        }
    }

    if pages_text.is_empty() {
        warn!(path = %path.display(), pages = page_count, "No text found in document");
        return Err(ExtractError::NoText);
    }

    info!(
        path = %path.display(),
        pages = page_count,
        text_pages = pages_text.len(),
        "Extracted document text"
    );
    Ok(pages_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_io_error() {
        let err = extract_text_from_pdf_by_page(Path::new("/nonexistent/policy.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    #[test]
    fn test_garbage_is_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = extract_text_from_pdf_by_page(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_no_text_message() {
        assert_eq!(
            ExtractError::NoText.user_message(),
            "Geen tekst gevonden in het document, controleer of de pdf goed is geladen."
        );
    }
}
