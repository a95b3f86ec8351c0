//! Query-side dense index: embeds the query text and fails closed.

use std::time::Instant;

use anyhow::anyhow;

use statdb_core::traits::Embedder;
use statdb_core::types::SearchHit;

use crate::flat::FlatIpIndex;

/// Owns the flat index and the embedder. The corpus never sees raw
/// vectors; it only receives row positions back.
pub struct DenseIndex {
    flat: FlatIpIndex,
    embedder: Box<dyn Embedder>,
}

impl DenseIndex {
    pub fn new(flat: FlatIpIndex, embedder: Box<dyn Embedder>) -> Self {
        Self { flat, embedder }
    }

    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.flat.dim()
    }

    /// Embed the query and run inner-product top-k.
    ///
    /// Fails closed: any embedding error, a zero vector, or an empty index
    /// degrades to an empty result so the lexical strategies still carry
    /// the query.
    pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        if self.flat.is_empty() {
            return Vec::new();
        }
        let started = Instant::now();
        match self.embed_query(query) {
            Ok(vector) => {
                let hits = self.flat.search(&vector, k);
                tracing::debug!(
                    hits = hits.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "dense search completed"
                );
                hits
            }
            Err(error) => {
                tracing::warn!(%error, "dense search degraded to empty result");
                Vec::new()
            }
        }
    }

    fn embed_query(&self, query: &str) -> anyhow::Result<Vec<f32>> {
        let mut vectors = self.embedder.embed_batch(&[query.to_string()])?;
        if vectors.is_empty() {
            return Err(anyhow!("embedder returned no vectors"));
        }
        let vector = vectors.remove(0);
        if vector.len() != self.flat.dim() {
            return Err(anyhow!(
                "query embedding has dimension {}, index expects {}",
                vector.len(),
                self.flat.dim()
            ));
        }
        if vector.iter().all(|x| x.abs() < f32::EPSILON) {
            return Err(anyhow!("embedder returned a zero vector"));
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statdb_embed::HashEmbedder;

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn model(&self) -> &str {
            "failing"
        }
        fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Err(anyhow!("service unavailable"))
        }
    }

    fn build(embedder: Box<dyn Embedder>) -> DenseIndex {
        let hash = HashEmbedder::new(32);
        let texts = vec![
            "総人口 国勢調査".to_string(),
            "完全失業率 労働力調査".to_string(),
        ];
        let mut flat = FlatIpIndex::new(32);
        for v in hash.embed_batch(&texts).unwrap() {
            flat.add(&v).unwrap();
        }
        DenseIndex::new(flat, embedder)
    }

    #[test]
    fn retrieves_nearest_row_for_matching_query() {
        let index = build(Box::new(HashEmbedder::new(32)));
        let hits = index.search("総人口", 2);
        assert_eq!(hits[0].row, 0);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn embedding_failure_degrades_to_empty() {
        let index = build(Box::new(FailingEmbedder));
        assert!(index.search("総人口", 2).is_empty());
    }

    #[test]
    fn blank_query_embeds_to_zero_and_degrades() {
        let index = build(Box::new(HashEmbedder::new(32)));
        assert!(index.search("", 2).is_empty());
    }
}
