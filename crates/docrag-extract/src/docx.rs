use regex::Regex;
use std::io::{Cursor, Read};
use std::sync::OnceLock;

use docrag_core::traits::TextExtractor;
use docrag_core::types::PageText;
use docrag_core::{Error, Result};

use crate::single_page;

/// WordprocessingML: paragraphs of `word/document.xml`, one per line.
pub struct DocxExtractor;

struct Patterns {
    paragraph_end: Regex,
    run_text: Regex,
}

fn patterns() -> Result<&'static Patterns> {
    static PATTERNS: OnceLock<std::result::Result<Patterns, regex::Error>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Ok(Patterns {
                paragraph_end: Regex::new(r"</w:p>")?,
                // Matches <w:t>, <w:t xml:space=..>, <w:tab/> and <w:br/>.
                run_text: Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:(tab|br|cr)\s*/>")?,
            })
        })
        .as_ref()
        .map_err(|e| Error::Extraction(format!("docx patterns: {e}")))
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn document_text(xml: &str) -> Result<String> {
    let p = patterns()?;
    let mut paragraphs = Vec::new();
    for para in p.paragraph_end.split(xml) {
        let mut line = String::new();
        for cap in p.run_text.captures_iter(para) {
            if let Some(text) = cap.get(1) {
                line.push_str(&decode_entities(text.as_str()));
            } else if let Some(tag) = cap.get(2) {
                line.push(if tag.as_str() == "tab" { '\t' } else { '\n' });
            }
        }
        if !line.trim().is_empty() {
            paragraphs.push(line);
        }
    }
    Ok(paragraphs.join("\n"))
}

impl TextExtractor for DocxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageText>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::Extraction(format!("Failed to read DOCX as ZIP: {e}")))?;
        let mut file = archive
            .by_name("word/document.xml")
            .map_err(|e| Error::Extraction(format!("DOCX has no word/document.xml: {e}")))?;
        let mut xml = String::new();
        file.read_to_string(&mut xml)
            .map_err(|e| Error::Extraction(format!("Failed to read document.xml: {e}")))?;
        Ok(single_page(document_text(&xml)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_become_lines() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Rain</w:t></w:r><w:r><w:t xml:space="preserve"> barrels &amp; gutters</w:t></w:r></w:p>
            <w:p><w:r><w:t></w:t></w:r></w:p>
            <w:p><w:r><w:t>Col A</w:t><w:tab/><w:t>Col B</w:t></w:r></w:p>
        </w:body></w:document>"#;
        assert_eq!(document_text(xml).unwrap(), "Rain barrels & gutters\nCol A\tCol B");
    }

    #[test]
    fn not_a_zip_is_extraction_error() {
        let err = DocxExtractor.extract(b"plain bytes").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
