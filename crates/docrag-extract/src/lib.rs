//! Per-format text extraction and upload validation.
//!
//! Every [`DocumentKind`] maps to exactly one extractor. PDFs keep their page
//! numbers; the other formats come back as a single page 1.

mod docx;
mod markdown;
mod pdf;
mod text;
mod upload;

pub use docx::DocxExtractor;
pub use markdown::MarkdownExtractor;
pub use pdf::PdfExtractor;
pub use text::PlainTextExtractor;
pub use upload::{validate_upload, Upload, MAX_UPLOAD_BYTES};

use std::path::Path;

use docrag_core::traits::TextExtractor;
use docrag_core::types::{DocumentKind, PageText};
use docrag_core::{Error, Result};

pub fn extractor_for(kind: DocumentKind) -> Box<dyn TextExtractor> {
    match kind {
        DocumentKind::Pdf => Box::new(PdfExtractor),
        DocumentKind::Docx => Box::new(DocxExtractor),
        DocumentKind::Markdown => Box::new(MarkdownExtractor),
        DocumentKind::PlainText => Box::new(PlainTextExtractor),
    }
}

pub fn extract_bytes(kind: DocumentKind, bytes: &[u8]) -> Result<Vec<PageText>> {
    extractor_for(kind).extract(bytes)
}

/// Read `path` and extract it according to its extension.
pub fn extract_file(path: &Path) -> Result<Vec<PageText>> {
    let kind = DocumentKind::from_path(path)
        .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
    let bytes = std::fs::read(path).map_err(|e| Error::Extraction(format!("{}: {e}", path.display())))?;
    extract_bytes(kind, &bytes)
}

/// One page 1 entry, or nothing when the text is blank.
pub(crate) fn single_page(text: String) -> Vec<PageText> {
    if text.trim().is_empty() {
        Vec::new()
    } else {
        vec![PageText::new(text, Some(1))]
    }
}
