//! Embedding backends: deterministic feature hashing and a local candle model.

pub mod device;
mod hash;
mod model;
mod pool;
mod tokenize;

pub use hash::HashEmbedder;
pub use model::{resolve_model_dir, CandleEmbedder};
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

use docrag_core::config::{EmbeddingBackend, EmbeddingSettings};
use docrag_core::traits::Embedder;

/// Build the embedder selected by `embedding.backend`.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` forces the hash backend regardless of
/// configuration, which keeps tests and CI away from model files.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake || settings.backend == EmbeddingBackend::Hash {
        info!(dim = settings.dim, "using hash embedder");
        return Ok(Arc::new(HashEmbedder::new(settings.dim)));
    }

    let dir = resolve_model_dir(settings.model_dir.as_deref())?;
    let model = CandleEmbedder::load(&dir)?;
    if model.dim() != settings.dim {
        bail!(
            "embedding.dim is {} but the model at {} produces {}-d vectors",
            settings.dim,
            dir.display(),
            model.dim()
        );
    }
    Ok(Arc::new(model))
}
