#![deny(warnings)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Lexical indexes: Okapi BM25 and a unigram+bigram TF-IDF vector space.
//!
//! Both are fitted once over the per-row descriptive text, serialized as
//! JSON artifacts, and queried read-only afterwards. Row identity is
//! positional and must match the corpus table and the dense index.

pub mod bm25;
pub mod tfidf;

pub use bm25::Bm25Index;
pub use tfidf::TfidfIndex;

use statdb_core::types::{RowId, SearchHit, Strategy};

/// Stable top-k selection over a dense score vector: descending by score,
/// ties broken by original row order. Rows that did not match at all
/// (score <= 0) are dropped rather than padding the result.
pub(crate) fn top_k_hits(scores: &[f32], k: usize, source: Strategy) -> Vec<SearchHit> {
    let mut order: Vec<RowId> = (0..scores.len()).filter(|&i| scores[i] > 0.0).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
        .into_iter()
        .take(k)
        .map(|row| SearchHit { row, score: scores[row], source })
        .collect()
}
