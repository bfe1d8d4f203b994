use docrag_core::config::{EmbeddingBackend, EmbeddingSettings};
use docrag_embed::{embedder_from_settings, HashEmbedder};
use docrag_core::traits::Embedder;

#[test]
fn hash_backend_shapes_and_determinism() {
    let settings = EmbeddingSettings { backend: EmbeddingBackend::Hash, dim: 256, model_dir: None };
    let embedder = embedder_from_settings(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string(), "other".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    assert_eq!(embs.len(), 3);

    let v1 = &embs[0];
    assert_eq!(v1.len(), 256);
    assert_eq!(embedder.dim(), 256);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(embs[1].iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn fake_flag_overrides_candle_backend() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let settings = EmbeddingSettings {
        backend: EmbeddingBackend::Candle,
        dim: 32,
        model_dir: Some("/definitely/not/here".to_string()),
    };
    let embedder = embedder_from_settings(&settings).expect("fake embedder");
    assert_eq!(embedder.id(), "hash:d32");
}

#[test]
fn empty_batch_is_empty() {
    let embedder = HashEmbedder::new(8);
    assert!(embedder.embed_batch(&[]).unwrap().is_empty());
}
