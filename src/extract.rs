//! Text extraction for uploaded documents.
//!
//! Turns raw document bytes into a single plain-text string by reading
//! pages/sections in stored order. Extraction is synchronous and stateless.
//!
//! A page that fails to decode is skipped with a warning rather than failing
//! the whole document; only an invalid byte stream for the declared format
//! fails extraction outright.

use crate::error::{Error, Result};

/// Document formats accepted by the ingestion pipeline, keyed off the
/// filename extension allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
    Markdown,
}

impl DocumentFormat {
    /// Resolve a format from the filename extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for anything outside the
    /// allow-list.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = filename
            .rsplit('.')
            .next()
            .filter(|ext| *ext != filename)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" => Ok(Self::PlainText),
            "md" => Ok(Self::Markdown),
            _ => Err(Error::UnsupportedFormat(filename.to_string())),
        }
    }
}

/// Extract plain text from document bytes.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::PlainText | DocumentFormat::Markdown => {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Extract text from a PDF, page by page in stored order.
///
/// Skips pages that fail to decode (logged, not fatal) so one corrupt page
/// does not discard an otherwise readable document.
fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|e| Error::Extraction(e.to_string()))?;

    let mut out = String::new();
    for (page_number, _) in document.get_pages() {
        match document.extract_text(&[page_number]) {
            Ok(page_text) => out.push_str(&page_text),
            Err(e) => {
                tracing::warn!(page = page_number, error = %e, "skipping undecodable PDF page");
            }
        }
    }

    Ok(out)
}
