//! Plain-text extraction for uploaded documents.
//!
//! Supported formats:
//! - PDF via `pdf-extract`
//! - DOCX by reading `word/document.xml` out of the zip container
//! - TXT / Markdown as UTF-8 (lossy)

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use crate::core::errors::ApiError;

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentKind {
    /// Detects the format from the file extension, then the declared content
    /// type.
    pub fn detect(filename: &str, content_type: Option<&str>) -> Option<Self> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => return Some(Self::Pdf),
            Some("docx") => return Some(Self::Docx),
            Some("txt") | Some("md") | Some("markdown") | Some("text") => {
                return Some(Self::PlainText)
            }
            _ => {}
        }

        match content_type.map(|ct| ct.split(';').next().unwrap_or("").trim()) {
            Some("application/pdf") => Some(Self::Pdf),
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document") => {
                Some(Self::Docx)
            }
            Some(ct) if ct.starts_with("text/") => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// Extracts readable text from an uploaded file.
pub fn extract_text(
    filename: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<String, ApiError> {
    let kind = DocumentKind::detect(filename, content_type).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Unsupported file type for '{}': use PDF, DOCX or TXT",
            filename
        ))
    })?;

    let text = match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ApiError::BadRequest(format!("Could not read PDF: {}", e)))?,
        DocumentKind::Docx => docx_text(bytes)?,
        DocumentKind::PlainText => String::from_utf8_lossy(bytes).into_owned(),
    };

    let text = normalize_text(&text);
    if text.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "No text could be extracted from '{}'",
            filename
        )));
    }

    tracing::debug!(
        "Extracted {} chars from {} ({:?})",
        text.chars().count(),
        filename,
        kind
    );
    Ok(text)
}

fn docx_text(bytes: &[u8]) -> Result<String, ApiError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ApiError::BadRequest(format!("Could not open DOCX: {}", e)))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ApiError::BadRequest("DOCX has no document body".to_string()))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| ApiError::BadRequest(format!("Could not read DOCX body: {}", e)))?;

    docx_xml_to_text(&xml)
}

/// Walks the WordprocessingML body: `w:t` runs carry text, paragraphs end in
/// a newline, `w:br`/`w:cr` break lines and `w:tab` becomes a tab.
fn docx_xml_to_text(xml: &str) -> Result<String, ApiError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ApiError::BadRequest(format!("Malformed DOCX body: {}", e)))?;

        match event {
            Event::Start(tag) => match tag.name().as_ref() {
                b"w:t" => in_run_text = true,
                b"w:br" | b"w:cr" => text.push('\n'),
                b"w:tab" => text.push('\t'),
                _ => {}
            },
            Event::Empty(tag) => match tag.name().as_ref() {
                b"w:p" | b"w:br" | b"w:cr" => text.push('\n'),
                b"w:tab" => text.push('\t'),
                _ => {}
            },
            Event::End(tag) => match tag.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Text(run) if in_run_text => {
                let unescaped = run
                    .unescape()
                    .map_err(|e| ApiError::BadRequest(format!("Malformed DOCX text: {}", e)))?;
                text.push_str(&unescaped);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

fn normalize_text(text: &str) -> String {
    let unix = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = unix.lines().map(str::trim_end).collect();
    BLANK_LINES
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

/// Cuts `text` to at most `max_chars` characters without splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_body(xml: &str) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::SimpleFileOptions::default();
            writer
                .start_file("word/document.xml", options)
                .expect("start entry");
            writer.write_all(xml.as_bytes()).expect("write entry");
            writer.finish().expect("finish zip");
        }
        buffer.into_inner()
    }

    #[test]
    fn detects_kind_by_extension_then_content_type() {
        assert_eq!(DocumentKind::detect("deed.PDF", None), Some(DocumentKind::Pdf));
        assert_eq!(
            DocumentKind::detect("memo.docx", Some("application/octet-stream")),
            Some(DocumentKind::Docx)
        );
        assert_eq!(
            DocumentKind::detect("upload", Some("text/plain; charset=utf-8")),
            Some(DocumentKind::PlainText)
        );
        assert_eq!(DocumentKind::detect("photo.png", Some("image/png")), None);
    }

    #[test]
    fn plain_text_is_normalized() {
        let text = extract_text("notes.txt", None, b"Line one\r\n\r\n\r\n\r\nLine two   \n").unwrap();
        assert_eq!(text, "Line one\n\nLine two");
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>Trustee &amp; Beneficiary</w:t></w:r></w:p><w:p><w:r><w:t>Section</w:t><w:tab/><w:t>2</w:t></w:r></w:p></w:body></w:document>"#;
        let bytes = docx_with_body(xml);

        let text = extract_text("agreement.docx", None, &bytes).unwrap();

        assert_eq!(text, "Trustee & Beneficiary\nSection\t2");
    }

    #[test]
    fn docx_character_references_and_attributed_breaks() {
        let xml = r#"<w:body><w:p><w:r><w:t>Settlor&#8217;s trust</w:t><w:br w:type="page"/><w:t>Next&#x2019;s</w:t><w:tab /><w:t>col</w:t><w:cr/><w:t>end</w:t></w:r></w:p></w:body>"#;

        assert_eq!(
            docx_xml_to_text(xml).unwrap(),
            "Settlor\u{2019}s trust\nNext\u{2019}s\tcol\nend\n"
        );
    }

    #[test]
    fn text_outside_runs_is_ignored() {
        let xml = r#"<w:body><w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t xml:space="preserve"> Article 1 </w:t></w:r></w:p><w:p/><w:sectPr>stray</w:sectPr></w:body>"#;

        assert_eq!(docx_xml_to_text(xml).unwrap(), " Article 1 \n\n");
    }

    #[test]
    fn unsupported_empty_and_corrupt_inputs_are_bad_requests() {
        assert!(matches!(
            extract_text("image.gif", Some("image/gif"), b"GIF89a"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            extract_text("blank.txt", None, b"  \n \n"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            extract_text("broken.docx", None, b"not a zip"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("fiduciaire é", 11), "fiduciaire ");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 50), "short");
        assert_eq!(truncate_chars("", 0), "");
    }
}
