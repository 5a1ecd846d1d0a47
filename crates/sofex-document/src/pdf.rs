//! PDF page text via the Poppler command-line tools.
//!
//! Each page is tried against the native text layer first (`pdftotext`).
//! Pages whose layer is below the density threshold are rasterized and
//! OCR'd when OCR is enabled, and emitted empty otherwise.

use std::io::Write;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use crate::ocr;
use crate::{DocumentError, ExtractionMethod, LoaderOptions, PageText, content_chars};

pub(crate) fn extract_pages(
    bytes: &[u8],
    enable_ocr: bool,
    options: &LoaderOptions,
) -> Result<Vec<PageText>, DocumentError> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(DocumentError::CorruptDocument(
            "missing %PDF header".to_string(),
        ));
    }

    // Poppler works on files, so stage the bytes in a scratch directory.
    let workdir = TempDir::new()?;
    let pdf_path = workdir.path().join("input.pdf");
    let mut file = std::fs::File::create(&pdf_path)?;
    file.write_all(bytes)?;
    drop(file);

    let page_count = pdf_page_count(&pdf_path)?;
    let mut pages = Vec::with_capacity(page_count as usize);

    for page_num in 1..=page_count {
        let native = pdftotext_page(&pdf_path, page_num)?;

        if content_chars(&native) >= options.min_chars_per_page {
            pages.push(PageText {
                page: page_num,
                text: native,
                method: ExtractionMethod::Native,
                confidence: 1.0,
            });
            continue;
        }

        if enable_ocr {
            let text = ocr::ocr_pdf_page(&pdf_path, page_num, workdir.path(), options)?;
            pages.push(PageText {
                page: page_num,
                text,
                method: ExtractionMethod::Ocr,
                confidence: options.ocr_confidence,
            });
        } else {
            // A sparse text layer (a watermark, a stamp) is not trusted as
            // page content. Without OCR the page degrades to empty.
            log::debug!("page {page_num}: text layer below density threshold, OCR disabled");
            pages.push(PageText {
                page: page_num,
                text: String::new(),
                method: ExtractionMethod::Native,
                confidence: 0.0,
            });
        }
    }

    Ok(pages)
}

/// Page count via `pdfinfo`.
fn pdf_page_count(pdf_path: &Path) -> Result<u32, DocumentError> {
    let output = Command::new("pdfinfo").arg(pdf_path).output();

    let output = match output {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DocumentError::ToolNotFound(
                "pdfinfo (install poppler-utils)".to_string(),
            ));
        }
        Err(e) => return Err(DocumentError::Io(e)),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DocumentError::CorruptDocument(format!(
            "pdfinfo failed: {}",
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("Pages:") {
            if let Ok(count) = rest.trim().parse::<u32>() {
                if count == 0 {
                    return Err(DocumentError::CorruptDocument(
                        "document has no pages".to_string(),
                    ));
                }
                return Ok(count);
            }
        }
    }
    Err(DocumentError::CorruptDocument(
        "pdfinfo reported no page count".to_string(),
    ))
}

/// Run `pdftotext` on a single page.
fn pdftotext_page(pdf_path: &Path, page: u32) -> Result<String, DocumentError> {
    let page_str = page.to_string();
    let output = Command::new("pdftotext")
        .args(["-layout", "-enc", "UTF-8", "-f", &page_str, "-l", &page_str])
        .arg(pdf_path)
        .arg("-")
        .output();

    match output {
        Ok(o) if o.status.success() => Ok(String::from_utf8_lossy(&o.stdout).to_string()),
        Ok(o) => {
            let stderr = String::from_utf8_lossy(&o.stderr);
            Err(DocumentError::CorruptDocument(format!(
                "pdftotext failed on page {page}: {}",
                stderr.trim()
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DocumentError::ToolNotFound(
            "pdftotext (install poppler-utils)".to_string(),
        )),
        Err(e) => Err(DocumentError::Io(e)),
    }
}
