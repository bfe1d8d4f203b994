//! Domain types shared by the chunker, the vector index and the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub type ChunkId = String;
pub type DocumentId = String;
pub type OwnerId = String;

/// Closed set of source formats accepted for ingestion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Markdown,
    PlainText,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [Self::Pdf, Self::Docx, Self::Markdown, Self::PlainText];

    /// Map a file extension (without the dot, any case) to a kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "md" => Some(Self::Markdown),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Markdown => "md",
            Self::PlainText => "txt",
        }
    }
}

/// Ingestion state of a document.
///
/// `Received → Extracted → Chunked → Indexed → Processed`, or `Failed` from
/// any state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentStatus {
    Received,
    Extracted,
    Chunked,
    Indexed,
    Processed,
    Failed { reason: String },
}

impl DocumentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Extracted => "extracted",
            Self::Chunked => "chunked",
            Self::Indexed => "indexed",
            Self::Processed => "processed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Metadata record of an uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub kind: DocumentKind,
    pub owner_id: OwnerId,
    /// Where the source bytes live; needed to reprocess.
    pub source_path: Option<PathBuf>,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
    pub total_chunks: usize,
}

impl Document {
    pub fn new(title: impl Into<String>, kind: DocumentKind, owner_id: impl Into<OwnerId>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            kind,
            owner_id: owner_id.into(),
            source_path: None,
            uploaded_at: Utc::now(),
            status: DocumentStatus::Received,
            total_chunks: 0,
        }
    }

    pub fn processed(&self) -> bool {
        self.status == DocumentStatus::Processed
    }
}

/// Text of one logical page as produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub text: String,
    pub page: Option<u32>,
}

impl PageText {
    pub fn new(text: impl Into<String>, page: Option<u32>) -> Self {
        Self { text: text.into(), page }
    }
}

/// A chunker output before it is assigned an id and a document index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChunk {
    pub content: String,
    pub page: Option<u32>,
}

/// A retrievable span of a document.
///
/// - `id`: globally unique, never reused
/// - `index`: zero-based position, unique per `(document_id, index)`
/// - `page`: source page, `None` when the format has no pages
/// - `embedding_stored`: true once the vector is committed to the index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub content: String,
    pub index: usize,
    pub page: Option<u32>,
    pub embedding_stored: bool,
}

impl Chunk {
    pub fn new(document_id: &str, index: usize, page_chunk: PageChunk) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            content: page_chunk.content,
            index,
            page: page_chunk.page,
            embedding_stored: false,
        }
    }
}

/// One row of the vector index. `chunk_id` is a weak reference.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub chunk_id: ChunkId,
    pub owner_id: OwnerId,
}

/// A scored index row. Higher `score` is better; cosine range [-1, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: ChunkId,
    pub owner_id: OwnerId,
    pub score: f32,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub document_id: DocumentId,
    pub success: bool,
    pub chunk_count: usize,
    pub error: Option<String>,
}

impl ProcessingResult {
    pub fn processed(document_id: &str, chunk_count: usize) -> Self {
        Self { document_id: document_id.to_string(), success: true, chunk_count, error: None }
    }

    pub fn failed(document_id: &str, reason: impl Into<String>) -> Self {
        Self { document_id: document_id.to_string(), success: false, chunk_count: 0, error: Some(reason.into()) }
    }
}

/// Response of the question-answering operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
    /// Seconds spent answering.
    pub response_time: f64,
    pub cached: bool,
}

/// A question asked by an owner, with the answer it received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLog {
    pub id: String,
    pub owner_id: OwnerId,
    pub question: String,
    pub answer: String,
    pub sources: Vec<String>,
    pub response_time: f64,
    pub created_at: DateTime<Utc>,
}

impl QueryLog {
    pub fn new(owner_id: &str, question: &str, answer: &Answer) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            question: question.to_string(),
            answer: answer.answer.clone(),
            sources: answer.sources.clone(),
            response_time: answer.response_time,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension_is_case_insensitive() {
        assert_eq!(DocumentKind::from_extension("PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_extension("Md"), Some(DocumentKind::Markdown));
        assert_eq!(DocumentKind::from_extension("exe"), None);
        for kind in DocumentKind::ALL {
            assert_eq!(DocumentKind::from_extension(kind.extension()), Some(kind));
        }
    }

    #[test]
    fn kind_from_path_reads_extension() {
        assert_eq!(DocumentKind::from_path(Path::new("/tmp/notes.TXT")), Some(DocumentKind::PlainText));
        assert_eq!(DocumentKind::from_path(Path::new("/tmp/noext")), None);
    }

    #[test]
    fn new_document_starts_received() {
        let doc = Document::new("manual", DocumentKind::Pdf, "alice");
        assert_eq!(doc.status, DocumentStatus::Received);
        assert!(!doc.processed());
        assert_eq!(doc.total_chunks, 0);
    }

    #[test]
    fn chunk_ids_are_unique() {
        let pc = PageChunk { content: "x".into(), page: Some(1) };
        let a = Chunk::new("d", 0, pc.clone());
        let b = Chunk::new("d", 1, pc);
        assert_ne!(a.id, b.id);
        assert!(!a.embedding_stored);
    }

    #[test]
    fn status_serializes_tagged() {
        let s = serde_json::to_string(&DocumentStatus::Failed { reason: "boom".into() }).unwrap();
        assert!(s.contains("\"state\":\"failed\""));
        assert!(s.contains("boom"));
    }
}
