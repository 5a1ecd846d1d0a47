//! Tesseract OCR for pages without a usable text layer.
//!
//! Pages are rasterized with `pdftoppm` and fed to the `tesseract`
//! binary. Both tools are resolved at call time; a missing tool surfaces
//! as [`DocumentError::OcrUnavailable`] since the caller explicitly asked
//! for OCR.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{DocumentError, LoaderOptions};

pub(crate) fn ocr_pdf_page(
    pdf_path: &Path,
    page: u32,
    workdir: &Path,
    options: &LoaderOptions,
) -> Result<String, DocumentError> {
    let image_path = pdf_page_to_image(pdf_path, page, workdir, options.ocr_dpi)?;
    run_tesseract(&image_path, &options.ocr_language)
}

/// Convert one PDF page to a PNG with `pdftoppm`.
fn pdf_page_to_image(
    pdf_path: &Path,
    page: u32,
    workdir: &Path,
    dpi: u32,
) -> Result<PathBuf, DocumentError> {
    let page_str = page.to_string();
    let dpi_str = dpi.to_string();
    let prefix = workdir.join(format!("ocr-{page}"));

    let status = Command::new("pdftoppm")
        .args(["-png", "-r", &dpi_str, "-f", &page_str, "-l", &page_str])
        .arg(pdf_path)
        .arg(&prefix)
        .status();

    match status {
        Ok(s) if s.success() => find_page_image(workdir, page).ok_or_else(|| {
            DocumentError::OcrUnavailable(format!("no image produced for page {page}"))
        }),
        Ok(_) => Err(DocumentError::OcrUnavailable(format!(
            "pdftoppm failed to rasterize page {page}"
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DocumentError::OcrUnavailable(
            "pdftoppm not found (install poppler-utils)".to_string(),
        )),
        Err(e) => Err(DocumentError::Io(e)),
    }
}

/// Find the image pdftoppm produced for a page.
///
/// pdftoppm pads the page number to the document's width: ocr-3-01.png,
/// ocr-3-001.png, and so on.
fn find_page_image(workdir: &Path, page: u32) -> Option<PathBuf> {
    for digits in [1, 2, 3, 4] {
        let filename = format!("ocr-{page}-{page:0width$}.png", width = digits);
        let path = workdir.join(&filename);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Run Tesseract on an image file.
fn run_tesseract(image_path: &Path, language: &str) -> Result<String, DocumentError> {
    let output = Command::new("tesseract")
        .arg(image_path)
        .arg("stdout")
        .args(["-l", language])
        .output();

    match output {
        Ok(o) if o.status.success() => Ok(String::from_utf8_lossy(&o.stdout).to_string()),
        Ok(o) => {
            let stderr = String::from_utf8_lossy(&o.stderr);
            Err(DocumentError::OcrUnavailable(format!(
                "tesseract failed: {}",
                stderr.trim()
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DocumentError::OcrUnavailable(
            "tesseract not found (install tesseract-ocr)".to_string(),
        )),
        Err(e) => Err(DocumentError::Io(e)),
    }
}
