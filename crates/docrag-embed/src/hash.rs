use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use docrag_core::traits::Embedder;

/// Deterministic feature-hashing embedder.
///
/// Lower-cased alphanumeric tokens are hashed into `dim` signed buckets and
/// the result is L2-normalised, so texts sharing words score high under
/// cosine similarity. Needs no model files; used offline and in tests.
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("hash:d{dim}") }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        let mut tokens = lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).peekable();
        if tokens.peek().is_none() {
            // Punctuation-only input still gets a stable non-zero vector.
            let (idx, sign) = self.bucket(lowered.trim());
            v[idx] += sign;
        } else {
            for token in tokens {
                let (idx, sign) = self.bucket(token);
                v[idx] += sign;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            // Colliding tokens cancelled out.
            v[0] = 1.0;
        } else {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let mut hasher = XxHash64::with_seed(0);
        token.hash(&mut hasher);
        let h = hasher.finish();
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        ((h as usize) % self.dim, sign)
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
