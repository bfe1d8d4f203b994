use docrag_core::traits::TextExtractor;
use docrag_core::types::PageText;
use docrag_core::Result;

use crate::single_page;

/// UTF-8 text; invalid sequences are replaced rather than rejected.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageText>> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        Ok(single_page(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let pages = PlainTextExtractor.extract(b"caf\xe9 open").unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page, Some(1));
        assert!(pages[0].text.starts_with("caf"));
        assert!(pages[0].text.ends_with("open"));
    }

    #[test]
    fn bom_is_dropped_and_blank_is_empty() {
        let pages = PlainTextExtractor.extract("\u{feff}hello".as_bytes()).unwrap();
        assert_eq!(pages[0].text, "hello");
        assert!(PlainTextExtractor.extract(b"  \n ").unwrap().is_empty());
    }
}
