use std::sync::Arc;
use tracing::debug;

use docrag_core::config::RetrievalSettings;
use docrag_core::traits::{Embedder, MetadataStore};
use docrag_core::types::Chunk;
use docrag_core::Result;
use docrag_vector::SharedIndex;

use crate::embedding::embed_blocking;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Owner-scoped semantic search over the shared index.
pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
    index: Arc<SharedIndex>,
    store: Arc<dyn MetadataStore>,
    similarity_threshold: f32,
    default_top_k: usize,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<SharedIndex>,
        store: Arc<dyn MetadataStore>,
        settings: &RetrievalSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
            similarity_threshold: settings.similarity_threshold,
            default_top_k: settings.top_k,
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// The `top_k` best chunks of `owner_id` scoring at least the threshold,
    /// best first. Chunks deleted since they were indexed are skipped.
    pub async fn retrieve(&self, question: &str, owner_id: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let snapshot = self.index.snapshot();
        if snapshot.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query = embed_blocking(Arc::clone(&self.embedder), vec![question.to_string()])
            .await?
            .pop()
            .unwrap_or_default();
        // Every row is a candidate; the owner filter runs before ranking.
        let hits = snapshot.search_where(&query, snapshot.len(), |_, owner| owner == owner_id)?;
        let candidates = hits.len();

        let mut out = Vec::with_capacity(top_k.min(candidates));
        for hit in hits.into_iter().take_while(|h| h.score >= self.similarity_threshold) {
            match self.store.chunk(&hit.chunk_id)? {
                Some(chunk) => out.push(RetrievedChunk { chunk, score: hit.score }),
                None => debug!(chunk_id = %hit.chunk_id, "skipping index entry without chunk"),
            }
            if out.len() == top_k {
                break;
            }
        }
        debug!(owner_id, candidates, returned = out.len(), "retrieved chunks");
        Ok(out)
    }
}
