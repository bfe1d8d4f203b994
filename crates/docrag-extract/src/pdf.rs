use lopdf::Document;
use tracing::warn;

use docrag_core::traits::TextExtractor;
use docrag_core::types::PageText;
use docrag_core::{Error, Result};

/// One entry per PDF page that carries text, numbered from 1.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageText>> {
        let doc = Document::load_mem(bytes).map_err(|e| Error::Extraction(format!("Failed to load PDF: {e}")))?;

        let mut pages = Vec::new();
        // get_pages is keyed by page number, already in order.
        for page_num in doc.get_pages().into_keys() {
            match doc.extract_text(&[page_num]) {
                Ok(text) if !text.trim().is_empty() => pages.push(PageText::new(text.trim(), Some(page_num))),
                Ok(_) => {}
                Err(e) => warn!(page = page_num, error = %e, "skipping unreadable PDF page"),
            }
        }
        Ok(pages)
    }
}
