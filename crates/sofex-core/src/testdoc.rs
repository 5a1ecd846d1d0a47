//! In-memory DOCX fixtures for tests. No external toolchain involved.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

/// Build a DOCX whose pages each hold the given lines, one paragraph per
/// line, separated by rendered page breaks.
pub(crate) fn sof_docx(pages: &[&[&str]]) -> Vec<u8> {
    let mut body = String::new();
    for (i, lines) in pages.iter().enumerate() {
        if i > 0 {
            body.push_str("<w:p><w:r><w:lastRenderedPageBreak/></w:r></w:p>");
        }
        for line in *lines {
            body.push_str(&format!("<w:p><w:r><w:t>{line}</w:t></w:r></w:p>"));
        }
    }
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}</w:body></w:document>"
    );

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .expect("write fixture");
    writer.write_all(xml.as_bytes()).expect("write fixture");
    writer.finish().expect("write fixture").into_inner()
}
