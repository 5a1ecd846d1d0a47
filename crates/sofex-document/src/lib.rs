//! Loading of Statement of Facts documents into page-indexed text.
//!
//! PDF files go through the Poppler tools (`pdftotext`, `pdfinfo`) for the
//! native text layer, falling back to Tesseract OCR for pages whose text
//! layer is too sparse to trust. DOCX files are read directly from the
//! container. The output is a contiguous sequence of [`PageText`] records,
//! one per page, each carrying the extraction method and a reliability
//! score that downstream confidence scoring folds in.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod docx;
mod ocr;
mod pdf;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("corrupt document: {0}")]
    CorruptDocument(String),
    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),
    #[error("required tool not found: {0}")]
    ToolNotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the text of a page was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Taken from the document's own text layer.
    Native,
    /// Recognized from a page image.
    Ocr,
}

/// Text extracted from a single page.
///
/// Page numbers are contiguous starting at 1. `confidence` is 1.0 for a
/// trusted native text layer, lower for OCR output, and 0.0 for a page
/// that yielded no usable text at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    pub page: u32,
    pub text: String,
    pub method: ExtractionMethod,
    pub confidence: f64,
}

/// Supported input containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Resolve a declared media type or extension spelling.
    ///
    /// Accepts `"pdf"`, `".pdf"`, `"application/pdf"` and the DOCX
    /// equivalents. Anything else is unrecognized.
    pub fn from_declared(declared: &str) -> Option<Self> {
        let d = declared.trim().trim_start_matches('.').to_ascii_lowercase();
        match d.as_str() {
            "pdf" | "application/pdf" => Some(DocumentFormat::Pdf),
            "docx"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DocumentFormat::Docx)
            }
            _ => None,
        }
    }
}

/// Tunables for the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Minimum non-whitespace characters for a page's text layer to count
    /// as native. Pages below this go to OCR (or come back empty).
    pub min_chars_per_page: usize,
    /// Rasterization resolution handed to pdftoppm.
    pub ocr_dpi: u32,
    /// Tesseract language setting.
    pub ocr_language: String,
    /// Reliability assigned to OCR-produced page text.
    pub ocr_confidence: f64,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            min_chars_per_page: 100,
            ocr_dpi: 300,
            ocr_language: "eng".to_string(),
            ocr_confidence: 0.75,
        }
    }
}

/// Load a document into page-indexed text with default [`LoaderOptions`].
pub fn load(
    bytes: &[u8],
    declared_type: &str,
    enable_ocr: bool,
) -> Result<Vec<PageText>, DocumentError> {
    load_with_options(bytes, declared_type, enable_ocr, &LoaderOptions::default())
}

/// Load a document into page-indexed text.
///
/// The declared type selects the parser; the container is still validated,
/// so a mislabeled or truncated file fails with
/// [`DocumentError::CorruptDocument`]. With `enable_ocr` off, pages whose
/// text layer fails the density check are emitted empty with zero
/// confidence rather than failing the load.
pub fn load_with_options(
    bytes: &[u8],
    declared_type: &str,
    enable_ocr: bool,
    options: &LoaderOptions,
) -> Result<Vec<PageText>, DocumentError> {
    let format = DocumentFormat::from_declared(declared_type)
        .ok_or_else(|| DocumentError::UnsupportedFormat(declared_type.to_string()))?;

    let pages = match format {
        DocumentFormat::Pdf => pdf::extract_pages(bytes, enable_ocr, options)?,
        DocumentFormat::Docx => docx::extract_pages(bytes)?,
    };

    debug_assert!(
        pages.iter().enumerate().all(|(i, p)| p.page == i as u32 + 1),
        "page numbers must be contiguous from 1"
    );
    log::debug!(
        "loaded {} page(s), {} via OCR",
        pages.len(),
        pages
            .iter()
            .filter(|p| p.method == ExtractionMethod::Ocr)
            .count()
    );
    Ok(pages)
}

/// Count the characters that carry signal for the density check.
pub(crate) fn content_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_spellings() {
        assert_eq!(DocumentFormat::from_declared("pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_declared(".PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(
            DocumentFormat::from_declared("application/pdf"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(DocumentFormat::from_declared("docx"), Some(DocumentFormat::Docx));
        assert_eq!(
            DocumentFormat::from_declared(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            Some(DocumentFormat::Docx)
        );
        assert_eq!(DocumentFormat::from_declared("doc"), None);
        assert_eq!(DocumentFormat::from_declared("txt"), None);
    }

    #[test]
    fn unsupported_format_is_an_error() {
        let err = load(b"hello", "txt", false).unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedFormat(_)));
    }

    #[test]
    fn pdf_without_magic_is_corrupt() {
        let err = load(b"not a pdf at all", "pdf", false).unwrap_err();
        assert!(matches!(err, DocumentError::CorruptDocument(_)));
    }

    #[test]
    fn docx_with_garbage_container_is_corrupt() {
        let err = load(b"PK\x03\x04garbage", "docx", false).unwrap_err();
        assert!(matches!(err, DocumentError::CorruptDocument(_)));
    }

    #[test]
    fn content_chars_ignores_whitespace() {
        assert_eq!(content_chars("  a b\tc\n"), 3);
        assert_eq!(content_chars("\n \t"), 0);
    }
}
