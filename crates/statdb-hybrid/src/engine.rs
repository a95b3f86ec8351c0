//! Score fusion, heuristic re-ranking and group deduplication.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

use statdb_core::config::Config;
use statdb_core::text::tokenize;
use statdb_core::traits::{Embedder, LexicalSearcher};
use statdb_core::types::{IndicatorRow, RankedIndicator, RowId, SearchHit, Strategy};
use statdb_core::{Error, Result};
use statdb_dense::{DenseIndex, FlatIpIndex};
use statdb_embed::get_default_embedder;
use statdb_lexical::{Bm25Index, TfidfIndex};

use crate::artifacts::{ArtifactSource, BuildMetadata, BM25_FILE, DENSE_INDEX_FILE, TFIDF_FILE};
use crate::store::CorpusStore;

/// Default share of the fused score given to the dense strategy; the two
/// lexical strategies split the remainder evenly.
pub const DEFAULT_VECTOR_WEIGHT: f32 = 0.6;

/// Hard cap on re-ranked candidates, bounding downstream prompt size.
pub const DEFAULT_RERANK_CAP: usize = 40;

#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub vector_weight: f32,
    pub rerank_cap: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { vector_weight: DEFAULT_VECTOR_WEIGHT, rerank_cap: DEFAULT_RERANK_CAP }
    }
}

impl SearchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            vector_weight: config.get_or("search.vector_weight", DEFAULT_VECTOR_WEIGHT),
            rerank_cap: config.get_or("search.rerank_cap", DEFAULT_RERANK_CAP),
        }
    }
}

/// The dependency-injected retrieval service: constructed once at process
/// startup, shared read-only by every caller. All state is immutable after
/// construction, so concurrent `hybrid_search` calls need no locking.
pub struct HybridSearchEngine {
    store: CorpusStore,
    dense: DenseIndex,
    bm25: Bm25Index,
    tfidf: TfidfIndex,
    settings: SearchSettings,
}

impl HybridSearchEngine {
    /// Assemble an engine from already-built parts, enforcing the
    /// row-alignment invariant across all four artifacts.
    pub fn new(
        store: CorpusStore,
        dense: DenseIndex,
        bm25: Bm25Index,
        tfidf: TfidfIndex,
        settings: SearchSettings,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&settings.vector_weight) {
            return Err(Error::InvalidConfig(format!(
                "vector_weight {} outside [0, 1]",
                settings.vector_weight
            )));
        }
        let counts = [store.len(), dense.len(), bm25.len(), tfidf.len()];
        if counts.iter().any(|&c| c != store.len()) {
            return Err(Error::Alignment(format!(
                "row counts differ: corpus={} dense={} bm25={} tfidf={}",
                counts[0], counts[1], counts[2], counts[3]
            )));
        }
        Ok(Self { store, dense, bm25, tfidf, settings })
    }

    /// Load the four artifacts plus metadata from the configured source.
    /// Any missing or malformed artifact is fatal for search capability.
    pub fn load(config: &Config) -> Result<Self> {
        let source = ArtifactSource::from_config(config);
        let dir = source.materialize()?;
        let embedder =
            get_default_embedder(config).map_err(|e| Error::Embedding(e.to_string()))?;
        Self::from_dir(&dir, embedder, SearchSettings::from_config(config))
    }

    /// Load from a directory holding all five artifact files.
    pub fn from_dir(
        dir: &Path,
        embedder: Box<dyn Embedder>,
        settings: SearchSettings,
    ) -> Result<Self> {
        let store = CorpusStore::load(dir)?;
        let flat = FlatIpIndex::load(&dir.join(DENSE_INDEX_FILE))?;
        let bm25 = Bm25Index::load(&dir.join(BM25_FILE))?;
        let tfidf = TfidfIndex::load(&dir.join(TFIDF_FILE))?;
        let metadata = BuildMetadata::load(dir)?;
        if metadata.total_records != store.len() {
            return Err(Error::Alignment(format!(
                "metadata records {} != corpus rows {}",
                metadata.total_records,
                store.len()
            )));
        }
        if metadata.vector_dimension != flat.dim() {
            return Err(Error::Alignment(format!(
                "metadata dimension {} != dense index dimension {}",
                metadata.vector_dimension,
                flat.dim()
            )));
        }
        tracing::info!(
            rows = store.len(),
            dim = flat.dim(),
            model = %metadata.embedding_model,
            "search engine loaded"
        );
        Self::new(store, DenseIndex::new(flat, embedder), bm25, tfidf, settings)
    }

    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    pub fn settings(&self) -> SearchSettings {
        self.settings
    }

    /// Hybrid retrieval with the configured vector weight.
    pub fn hybrid_search(&self, query: &str, top_k: usize) -> Vec<RankedIndicator> {
        self.hybrid_search_weighted(query, top_k, self.settings.vector_weight)
    }

    /// Hybrid retrieval: three strategies in parallel, additive fusion,
    /// heuristic re-rank, one representative per group.
    pub fn hybrid_search_weighted(
        &self,
        query: &str,
        top_k: usize,
        vector_weight: f32,
    ) -> Vec<RankedIndicator> {
        let total_start = Instant::now();
        // Over-fetch so fusion and re-ranking have enough material.
        let fetch = top_k * 2;

        let (dense_hits, bm25_hits, tfidf_hits) = std::thread::scope(|scope| {
            let dense = scope.spawn(|| self.dense.search(query, fetch));
            let bm25 = scope.spawn(|| self.bm25.search(query, fetch));
            let tfidf = scope.spawn(|| self.tfidf.search(query, fetch));
            (
                dense.join().unwrap_or_default(),
                recover(Strategy::Bm25, bm25.join()),
                recover(Strategy::Tfidf, tfidf.join()),
            )
        });
        tracing::info!(
            dense = dense_hits.len(),
            bm25 = bm25_hits.len(),
            tfidf = tfidf_hits.len(),
            "strategy results"
        );

        let (candidates, fused) =
            fuse(&dense_hits, &bm25_hits, &tfidf_hits, vector_weight, fetch);
        tracing::debug!(candidates = candidates.len(), "candidates before re-rank");

        let reranked = self.rerank(query, candidates, top_k.min(self.settings.rerank_cap));

        let mut seen_groups: HashSet<&str> = HashSet::new();
        let mut results = Vec::new();
        for row_id in reranked {
            let Some(row) = self.store.row(row_id) else { continue };
            if seen_groups.insert(row.group_code.as_str()) {
                let score = fused.get(&row_id).copied().unwrap_or(0.0);
                results.push(RankedIndicator::from_row(row, score));
            }
        }
        tracing::info!(
            results = results.len(),
            elapsed_ms = total_start.elapsed().as_millis() as u64,
            "hybrid search completed"
        );
        results
    }

    /// Secondary exact/overlap scoring against the raw query, independent
    /// of the fused score. Captures precise name matches that embedding
    /// similarity can miss; stable sort keeps fused order as the tie-break.
    fn rerank(&self, query: &str, candidates: Vec<RowId>, cap: usize) -> Vec<RowId> {
        let query_lower = query.to_lowercase();
        let query_words: HashSet<&str> = tokenize(&query_lower).collect();

        let mut scored: Vec<(RowId, u32)> = candidates
            .into_iter()
            .map(|row_id| {
                let score = self
                    .store
                    .row(row_id)
                    .map(|row| rerank_score(row, &query_lower, &query_words))
                    .unwrap_or(0);
                (row_id, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(cap);
        scored.into_iter().map(|(row_id, _)| row_id).collect()
    }
}

/// Substring match on any of the six text fields is worth 2 points per
/// field; each query word appearing as a whitespace token of the field is
/// worth 1 more.
fn rerank_score(row: &IndicatorRow, query_lower: &str, query_words: &HashSet<&str>) -> u32 {
    let mut score = 0u32;
    for field in row.text_fields() {
        let field_lower = field.to_lowercase();
        if field_lower.contains(query_lower) {
            score += 2;
        }
        let field_words: HashSet<&str> = tokenize(&field_lower).collect();
        score += query_words.intersection(&field_words).count() as u32;
    }
    score
}

/// Additive fusion: dense scores are used as-is (bounded), lexical scores
/// are normalized by their own per-query maximum. Rows seen by several
/// strategies accumulate each contribution. Returns the top candidates by
/// fused score (ties keep first-encountered order) plus the score map.
fn fuse(
    dense_hits: &[SearchHit],
    bm25_hits: &[SearchHit],
    tfidf_hits: &[SearchHit],
    vector_weight: f32,
    limit: usize,
) -> (Vec<RowId>, HashMap<RowId, f32>) {
    let keyword_weight = (1.0 - vector_weight) / 2.0;

    let mut order: Vec<RowId> = Vec::new();
    let mut fused: HashMap<RowId, f32> = HashMap::new();
    accumulate(&mut order, &mut fused, dense_hits, vector_weight, 1.0);
    accumulate(&mut order, &mut fused, bm25_hits, keyword_weight, max_score(bm25_hits));
    accumulate(&mut order, &mut fused, tfidf_hits, keyword_weight, max_score(tfidf_hits));

    let mut candidates: Vec<RowId> = order;
    candidates.sort_by(|a, b| {
        let sa = fused.get(a).copied().unwrap_or(0.0);
        let sb = fused.get(b).copied().unwrap_or(0.0);
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(limit);
    (candidates, fused)
}

fn accumulate(
    order: &mut Vec<RowId>,
    fused: &mut HashMap<RowId, f32>,
    hits: &[SearchHit],
    weight: f32,
    norm: f32,
) {
    for hit in hits {
        let entry = fused.entry(hit.row).or_insert_with(|| {
            order.push(hit.row);
            0.0
        });
        *entry += (hit.score / norm) * weight;
    }
}

/// Per-query normalization divisor; 1 when the best score is not positive,
/// to avoid dividing by zero.
fn max_score(hits: &[SearchHit]) -> f32 {
    let max = hits.iter().map(|h| h.score).fold(0.0f32, f32::max);
    if max > 0.0 {
        max
    } else {
        1.0
    }
}

fn recover(
    strategy: Strategy,
    joined: std::thread::Result<Result<Vec<SearchHit>>>,
) -> Vec<SearchHit> {
    match joined {
        Ok(Ok(hits)) => hits,
        Ok(Err(error)) => {
            tracing::warn!(strategy = strategy.label(), %error, "sub-search failed; contributing nothing");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(strategy = strategy.label(), "sub-search panicked; contributing nothing");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(row: RowId, score: f32, source: Strategy) -> SearchHit {
        SearchHit { row, score, source }
    }

    #[test]
    fn fusion_rewards_consensus_across_strategies() {
        let dense = vec![hit(0, 0.9, Strategy::Dense), hit(1, 0.8, Strategy::Dense)];
        let bm25 = vec![hit(1, 5.0, Strategy::Bm25)];
        let tfidf = vec![hit(1, 0.4, Strategy::Tfidf)];
        let (candidates, fused) = fuse(&dense, &bm25, &tfidf, 0.6, 10);
        // Row 1: 0.8*0.6 + 1.0*0.2 + 1.0*0.2 = 0.88 > row 0: 0.54
        assert_eq!(candidates[0], 1);
        assert!((fused[&1] - 0.88).abs() < 1e-5);
        assert!((fused[&0] - 0.54).abs() < 1e-5);
    }

    #[test]
    fn lexical_scores_normalize_by_their_own_maximum() {
        let bm25 = vec![hit(0, 10.0, Strategy::Bm25), hit(1, 5.0, Strategy::Bm25)];
        let (_, fused) = fuse(&[], &bm25, &[], 0.6, 10);
        assert!((fused[&0] - 0.2).abs() < 1e-5);
        assert!((fused[&1] - 0.1).abs() < 1e-5);
    }

    #[test]
    fn non_positive_max_keeps_divisor_one() {
        let tfidf = vec![hit(0, 0.0, Strategy::Tfidf)];
        let (candidates, fused) = fuse(&[], &[], &tfidf, 0.6, 10);
        assert_eq!(candidates, vec![0]);
        assert_eq!(fused[&0], 0.0);
    }

    #[test]
    fn fused_ties_keep_first_encountered_order() {
        let dense = vec![hit(3, 0.5, Strategy::Dense), hit(7, 0.5, Strategy::Dense)];
        let (candidates, _) = fuse(&dense, &[], &[], 0.6, 10);
        assert_eq!(candidates, vec![3, 7]);
    }

    #[test]
    fn rerank_scores_substring_and_word_overlap() {
        let row = IndicatorRow {
            code: "A1101".into(),
            name: "高齢化率".into(),
            full_name: "高齢化率（65歳以上人口割合）".into(),
            field: "人口・世帯".into(),
            subfield: "人口構造".into(),
            subsubfield: "年齢構成".into(),
            definition: "65歳以上人口 の 総人口 に対する割合".into(),
            source_name: "国勢調査".into(),
            group_code: "A1101".into(),
        };
        let query = "高齢化率（65歳以上人口割合）";
        let query_lower = query.to_lowercase();
        let words: HashSet<&str> = query_lower.split_whitespace().collect();
        // Substring match on full_name only.
        assert_eq!(rerank_score(&row, &query_lower, &words), 2);

        let query_lower = "総人口".to_lowercase();
        let words: HashSet<&str> = query_lower.split_whitespace().collect();
        // Substring (+2) and token (+1) in the definition.
        assert_eq!(rerank_score(&row, &query_lower, &words), 3);
    }
}
