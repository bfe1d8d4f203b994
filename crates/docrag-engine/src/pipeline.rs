//! Document ingestion: `Received → Extracted → Chunked → Indexed → Processed`,
//! or `Failed` with the document's chunks removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use docrag_core::chunker::Chunker;
use docrag_core::config::Settings;
use docrag_core::traits::{Embedder, MetadataStore};
use docrag_core::types::{Chunk, Document, DocumentStatus, IndexEntry, PageText, ProcessingResult};
use docrag_core::{Error, Result};
use docrag_extract::validate_upload;
use docrag_vector::SharedIndex;

use crate::embedding::embed_blocking;
use crate::retry::Backoff;

pub struct IngestionPipeline {
    store: Arc<dyn MetadataStore>,
    index: Arc<SharedIndex>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    backoff: Backoff,
    batch_size: usize,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        index: Arc<SharedIndex>,
        embedder: Arc<dyn Embedder>,
        settings: &Settings,
    ) -> Result<Self> {
        Ok(Self {
            store,
            index,
            embedder,
            chunker: Chunker::from_settings(&settings.chunking)?,
            backoff: Backoff::from_settings(&settings.ingest),
            batch_size: settings.ingest.embed_batch_size.max(1),
        })
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Validate an upload and record it as a `Received` document.
    pub fn register(&self, path: &Path, owner_id: &str) -> Result<Document> {
        let size = std::fs::metadata(path)
            .map_err(|e| Error::UploadRejected(format!("{}: {e}", path.display())))?
            .len();
        let upload = validate_upload(path, size)?;
        let mut document = Document::new(upload.title, upload.kind, owner_id);
        document.source_path = Some(path.to_path_buf());
        self.store.put_document(document.clone())?;
        info!(document_id = %document.id, title = %document.title, kind = ?document.kind, "document received");
        Ok(document)
    }

    /// Register `path` for `owner_id`, extract it and ingest the pages.
    ///
    /// Errors only when the upload is rejected; every later failure is
    /// reported through the returned [`ProcessingResult`].
    pub async fn ingest_file(&self, path: &Path, owner_id: &str) -> Result<ProcessingResult> {
        let document = self.register(path, owner_id)?;
        Ok(self.extract_and_ingest(&document, path.to_path_buf()).await)
    }

    /// Drop the document's chunks and index entries and ingest its source
    /// file again. Only the owner may reprocess a document.
    pub async fn reprocess(&self, document_id: &str, owner_id: &str) -> Result<ProcessingResult> {
        let document = self.owned_document(document_id, owner_id)?;
        let source = document
            .source_path
            .clone()
            .ok_or_else(|| Error::NotFound(format!("source file of document {document_id}")))?;

        let removed = self.store.delete_chunks(document_id)?;
        let dropped = self.drop_document_entries(document_id).await?;
        self.store.set_status(document_id, DocumentStatus::Received, 0)?;
        info!(document_id, removed, dropped, "reprocessing document");
        Ok(self.extract_and_ingest(&document, source).await)
    }

    async fn drop_document_entries(&self, document_id: &str) -> Result<usize> {
        let store = Arc::clone(&self.store);
        let document_id = document_id.to_string();
        self.index
            .rebuild(move |index| {
                Ok(index.retain(|chunk_id, _| match store.chunk(chunk_id) {
                    Ok(Some(chunk)) => chunk.document_id != document_id,
                    Ok(None) => false,
                    Err(_) => true,
                }))
            })
            .await
    }

    async fn extract_and_ingest(&self, document: &Document, path: PathBuf) -> ProcessingResult {
        let extracted = tokio::task::spawn_blocking(move || docrag_extract::extract_file(&path))
            .await
            .map_err(|e| Error::Extraction(format!("extraction task failed: {e}")))
            .and_then(|r| r);
        match extracted {
            Ok(pages) => self.ingest(&document.id, &document.owner_id, pages).await,
            Err(e) => self.fail(&document.id, &e),
        }
    }

    /// Chunk, embed and index already extracted pages of a registered
    /// document. A previous ingestion of the same document is replaced.
    ///
    /// A document that does not exist for `owner_id` is left untouched.
    pub async fn ingest(&self, document_id: &str, owner_id: &str, pages: Vec<PageText>) -> ProcessingResult {
        if let Err(e) = self.owned_document(document_id, owner_id) {
            warn!(document_id, owner_id, error = %e, "refusing to ingest");
            return ProcessingResult::failed(document_id, e.to_string());
        }
        match self.run(document_id, owner_id, pages).await {
            Ok(count) => ProcessingResult::processed(document_id, count),
            Err(e) => self.fail(document_id, &e),
        }
    }

    fn owned_document(&self, document_id: &str, owner_id: &str) -> Result<Document> {
        self.store
            .document(document_id)?
            .filter(|d| d.owner_id == owner_id)
            .ok_or_else(|| Error::NotFound(format!("document {document_id} for owner {owner_id}")))
    }

    async fn run(&self, document_id: &str, owner_id: &str, pages: Vec<PageText>) -> Result<usize> {
        self.store.set_status(document_id, DocumentStatus::Extracted, 0)?;

        // Extracted → Chunked
        let previous = self.store.delete_chunks(document_id)?;
        if previous > 0 {
            debug!(document_id, previous, "replacing chunks of an earlier ingestion");
        }
        let chunks: Vec<Chunk> = self
            .chunker
            .chunk_pages(&pages)
            .into_iter()
            .enumerate()
            .map(|(index, page_chunk)| Chunk::new(document_id, index, page_chunk))
            .collect();
        let count = chunks.len();
        self.store.insert_chunks(chunks.clone())?;
        self.store.set_status(document_id, DocumentStatus::Chunked, count)?;
        debug!(document_id, pages = pages.len(), chunks = count, "chunked document");

        // Chunked → Indexed
        let mut entries = Vec::with_capacity(count);
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self
                .backoff
                .retry("embed", || embed_blocking(Arc::clone(&self.embedder), texts.clone()))
                .await?;
            entries.extend(batch.iter().zip(vectors).map(|(chunk, vector)| IndexEntry {
                vector,
                chunk_id: chunk.id.clone(),
                owner_id: owner_id.to_string(),
            }));
        }
        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let store = Arc::clone(&self.store);
        let commit_store = Arc::clone(&self.store);
        let doc_id = document_id.to_string();
        let dropped = self
            .index
            .rebuild_then(
                move |index| {
                    let dropped = index.retain(|chunk_id, _| match store.chunk(chunk_id) {
                        Ok(Some(chunk)) => chunk.embedding_stored && chunk.document_id != doc_id,
                        Ok(None) => false,
                        // Keep entries we cannot check rather than lose them.
                        Err(_) => true,
                    });
                    index.add(entries)?;
                    Ok(dropped)
                },
                move |_| commit_store.set_embedding_stored(&ids, true),
            )
            .await?;
        self.store.set_status(document_id, DocumentStatus::Indexed, count)?;
        debug!(document_id, dropped, "indexed document");

        // Indexed → Processed
        self.store.set_status(document_id, DocumentStatus::Processed, count)?;
        info!(document_id, chunks = count, "document processed");
        Ok(count)
    }

    fn fail(&self, document_id: &str, error: &Error) -> ProcessingResult {
        let reason = error.to_string();
        warn!(document_id, error = %reason, "ingestion failed");
        if let Err(e) = self.store.delete_chunks(document_id) {
            warn!(document_id, error = %e, "could not remove chunks of failed document");
        }
        if let Err(e) = self.store.set_status(document_id, DocumentStatus::Failed { reason: reason.clone() }, 0) {
            warn!(document_id, error = %e, "could not mark document failed");
        }
        ProcessingResult::failed(document_id, reason)
    }
}
