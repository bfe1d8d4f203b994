use std::sync::Arc;

use docrag_core::traits::Embedder;
use docrag_core::{Error, Result};

/// Run the embedder on the blocking pool and check it answered every text.
pub(crate) async fn embed_blocking(embedder: Arc<dyn Embedder>, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
    let expected = texts.len();
    let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
        .await
        .map_err(|e| Error::Embedding(format!("embedding task failed: {e}")))?
        .map_err(|e| Error::Embedding(format!("{e:#}")))?;
    if vectors.len() != expected {
        return Err(Error::Embedding(format!("embedder returned {} vectors for {expected} texts", vectors.len())));
    }
    Ok(vectors)
}
