use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Chunk, ChunkId, Document, DocumentStatus, PageText, QueryLog};

/// Batched text embedding. Implementations return one vector of `dim()`
/// floats per input, in input order.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model, e.g. `hash:d384`.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Prompt plus sampling knobs handed to a [`Generator`].
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String>;
}

/// Turns the raw bytes of one document format into page-tagged text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageText>>;
}

/// Persistence of document, chunk and query metadata.
///
/// Ids are opaque; the store owns chunk lifecycle, the vector index only
/// refers to chunks by id.
pub trait MetadataStore: Send + Sync {
    fn put_document(&self, document: Document) -> Result<()>;
    fn document(&self, id: &str) -> Result<Option<Document>>;
    fn documents_for_owner(&self, owner_id: &str) -> Result<Vec<Document>>;
    fn set_status(&self, id: &str, status: DocumentStatus, total_chunks: usize) -> Result<()>;

    /// Insert chunk records; `(document_id, index)` must stay unique.
    fn insert_chunks(&self, chunks: Vec<Chunk>) -> Result<()>;
    fn chunk(&self, id: &str) -> Result<Option<Chunk>>;
    /// Chunks of a document ordered by `index`.
    fn chunks_for_document(&self, document_id: &str) -> Result<Vec<Chunk>>;
    fn set_embedding_stored(&self, ids: &[ChunkId], stored: bool) -> Result<()>;
    /// Remove every chunk of a document, returning how many were removed.
    fn delete_chunks(&self, document_id: &str) -> Result<usize>;

    fn log_query(&self, entry: QueryLog) -> Result<()>;
    /// Most recent queries of an owner, newest first.
    fn recent_queries(&self, owner_id: &str, limit: usize) -> Result<Vec<QueryLog>>;
}
