//! DOCX text extraction straight from the container.
//!
//! Reads `word/document.xml` out of the zip and walks the WordprocessingML
//! events: run text (`w:t`), paragraph ends, tabs, and rendered page
//! breaks (`w:lastRenderedPageBreak`, explicit `w:br w:type="page"`).
//! DOCX has no fixed pagination, so pages follow the breaks Word last
//! rendered; a document without any becomes a single page.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::{DocumentError, ExtractionMethod, PageText, content_chars};

pub(crate) fn extract_pages(bytes: &[u8]) -> Result<Vec<PageText>, DocumentError> {
    let cursor = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| DocumentError::CorruptDocument(format!("not a DOCX container: {e}")))?;

    let mut xml_bytes = Vec::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| DocumentError::CorruptDocument("missing word/document.xml".to_string()))?
        .read_to_end(&mut xml_bytes)?;
    let xml = String::from_utf8_lossy(&xml_bytes);

    let page_texts = walk_document_xml(&xml)?;

    Ok(page_texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let confidence = if content_chars(&text) > 0 { 1.0 } else { 0.0 };
            PageText {
                page: i as u32 + 1,
                text,
                method: ExtractionMethod::Native,
                confidence,
            }
        })
        .collect())
}

fn walk_document_xml(xml: &str) -> Result<Vec<String>, DocumentError> {
    let mut reader = Reader::from_str(xml);
    let mut pages: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_run_text = false;
    let mut cell_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:t" => in_run_text = true,
                b"w:tc" => cell_depth += 1,
                b"w:lastRenderedPageBreak" => flush_page(&mut pages, &mut current),
                b"w:br" if is_page_break(&e) => flush_page(&mut pages, &mut current),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:lastRenderedPageBreak" => flush_page(&mut pages, &mut current),
                b"w:br" if is_page_break(&e) => flush_page(&mut pages, &mut current),
                b"w:tab" => current.push('\t'),
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                // Inside a table, cells join a single line; the row ends it.
                b"w:p" if cell_depth == 0 => current.push('\n'),
                b"w:tc" => {
                    cell_depth = cell_depth.saturating_sub(1);
                    current.push('\t');
                }
                b"w:tr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_run_text => {
                let text = t
                    .unescape()
                    .map_err(|e| DocumentError::CorruptDocument(format!("bad XML text: {e}")))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(DocumentError::CorruptDocument(format!(
                    "invalid document XML: {e}"
                )));
            }
        }
    }

    pages.push(current);
    Ok(pages)
}

fn flush_page(pages: &mut Vec<String>, current: &mut String) {
    pages.push(std::mem::take(current));
}

fn is_page_break(e: &quick_xml::events::BytesStart<'_>) -> bool {
    e.attributes()
        .flatten()
        .any(|a| a.key.as_ref() == b"w:type" && a.value.as_ref() == b"page")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build an in-memory DOCX with the given document.xml body.
    fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}</w:body></w:document>"
        );
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn paragraph(text: &str) -> String {
        format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
    }

    #[test]
    fn single_page_paragraphs() {
        let body = format!(
            "{}{}",
            paragraph("Vessel Arrived 2024-01-15T08:30:00Z"),
            paragraph("NOR Tendered 2024-01-15T09:15:00Z")
        );
        let pages = load(&docx_with_body(&body), "docx", false).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[0].method, ExtractionMethod::Native);
        assert_eq!(pages[0].confidence, 1.0);
        assert!(pages[0].text.contains("Vessel Arrived"));
        assert!(pages[0].text.contains("NOR Tendered"));
        // Paragraphs come out as separate lines.
        assert_eq!(pages[0].text.lines().count(), 2);
    }

    #[test]
    fn rendered_page_break_splits_pages() {
        let body = format!(
            "{}<w:p><w:r><w:lastRenderedPageBreak/><w:t>Loading Completed</w:t></w:r></w:p>",
            paragraph("Loading Commenced")
        );
        let pages = load(&docx_with_body(&body), "docx", false).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[1].page, 2);
        assert!(pages[0].text.contains("Loading Commenced"));
        assert!(pages[1].text.contains("Loading Completed"));
    }

    #[test]
    fn explicit_page_break_splits_pages() {
        let body = format!(
            "{}<w:p><w:r><w:br w:type=\"page\"/><w:t>Page two</w:t></w:r></w:p>",
            paragraph("Page one")
        );
        let pages = load(&docx_with_body(&body), "docx", false).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[1].text.contains("Page two"));
    }

    #[test]
    fn line_break_without_page_type_does_not_split() {
        let body = "<w:p><w:r><w:t>before</w:t><w:br/><w:t>after</w:t></w:r></w:p>".to_string();
        let pages = load(&docx_with_body(&body), "docx", false).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn table_cells_are_tab_separated() {
        let body = "<w:tbl><w:tr>\
                    <w:tc><w:p><w:r><w:t>Loading Commenced</w:t></w:r></w:p></w:tc>\
                    <w:tc><w:p><w:r><w:t>15/01/2024 14:00</w:t></w:r></w:p></w:tc>\
                    </w:tr></w:tbl>";
        let pages = load(&docx_with_body(body), "docx", false).unwrap();
        let row_line = pages[0]
            .text
            .lines()
            .find(|l| l.contains("Loading Commenced"))
            .unwrap();
        // Event phrase and timestamp from sibling cells land on one line.
        assert!(row_line.contains("15/01/2024 14:00"));
    }

    #[test]
    fn empty_document_is_one_empty_page() {
        let pages = load(&docx_with_body(""), "docx", false).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].confidence, 0.0);
        assert_eq!(content_chars(&pages[0].text), 0);
    }

    #[test]
    fn docx_without_document_xml_is_corrupt() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/other.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<x/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        let err = load(&bytes, "docx", false).unwrap_err();
        assert!(matches!(err, DocumentError::CorruptDocument(_)));
    }

    #[test]
    fn entities_are_unescaped() {
        let body = paragraph("Hoses connected &amp; secured");
        let pages = load(&docx_with_body(&body), "docx", false).unwrap();
        assert!(pages[0].text.contains("connected & secured"));
    }
}
