//! Deterministic hashing embedder for tests and offline index builds.

use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use statdb_core::text::tokenize;
use statdb_core::traits::Embedder;

/// Maps each whitespace token into a hashed bucket, then L2-normalizes.
/// Texts sharing tokens produce correlated vectors, which is enough for the
/// retrieval pipeline to behave realistically without a model in the loop.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in tokenize(text).enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn model(&self) -> &str {
        "hash-embedder"
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_deterministic_and_unit_length() {
        let embedder = HashEmbedder::new(64);
        let texts = vec!["総人口 国勢調査".to_string()];
        let a = embedder.embed_batch(&texts).unwrap();
        let b = embedder.embed_batch(&texts).unwrap();
        assert_eq!(a, b);
        let norm: f32 = a[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_tokens_raise_similarity() {
        let embedder = HashEmbedder::new(128);
        let vs = embedder
            .embed_batch(&[
                "総人口 国勢調査".to_string(),
                "総人口 推計".to_string(),
                "完全失業率 労働力調査".to_string(),
            ])
            .unwrap();
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&vs[0], &vs[1]) > dot(&vs[0], &vs[2]));
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashEmbedder::new(32);
        let v = &embedder.embed_batch(&["".to_string()]).unwrap()[0];
        assert!(v.iter().all(|x| x.abs() < f32::EPSILON));
    }
}
