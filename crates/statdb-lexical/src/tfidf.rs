//! TF-IDF vector space with unigram+bigram features and a capped vocabulary.
//!
//! Follows the usual vectorizer semantics: smoothed idf
//! `ln((1+n)/(1+df)) + 1`, L2-normalized row vectors, cosine similarity via
//! dot products of unit vectors.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use statdb_core::text::tokenize;
use statdb_core::traits::LexicalSearcher;
use statdb_core::types::{SearchHit, Strategy};
use statdb_core::{Error, Result};

pub const MAX_FEATURES: usize = 10_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    fn l2_normalize(&mut self) {
        let norm = self.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut self.values {
                *v /= norm;
            }
        }
    }

    fn dot(&self, dense: &HashMap<u32, f32>) -> f32 {
        self.indices
            .iter()
            .zip(&self.values)
            .map(|(i, v)| dense.get(i).copied().unwrap_or(0.0) * v)
            .sum()
    }
}

/// A fitted TF-IDF vectorizer plus the row matrix, co-indexed with the
/// corpus table.
#[derive(Debug, Serialize, Deserialize)]
pub struct TfidfIndex {
    vocab: HashMap<String, u32>,
    idf: Vec<f32>,
    rows: Vec<SparseVector>,
}

/// Unigrams and space-joined bigrams of the whitespace tokens.
fn features(text: &str) -> Vec<String> {
    let tokens: Vec<&str> = tokenize(text).collect();
    let mut out: Vec<String> = tokens.iter().map(|t| (*t).to_string()).collect();
    for pair in tokens.windows(2) {
        out.push(format!("{} {}", pair[0], pair[1]));
    }
    out
}

impl TfidfIndex {
    /// Fit the vectorizer and transform every row.
    pub fn fit(texts: &[String]) -> Self {
        let mut total_count: HashMap<String, u64> = HashMap::new();
        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        let mut per_row: Vec<HashMap<String, u32>> = Vec::with_capacity(texts.len());

        for text in texts {
            let mut counts: HashMap<String, u32> = HashMap::new();
            for feature in features(text) {
                *counts.entry(feature).or_insert(0) += 1;
            }
            for (feature, count) in &counts {
                *total_count.entry(feature.clone()).or_insert(0) += u64::from(*count);
                *doc_freq.entry(feature.clone()).or_insert(0) += 1;
            }
            per_row.push(counts);
        }

        // Cap the vocabulary at the most frequent terms, ties alphabetical,
        // then assign ids in sorted term order.
        let mut terms: Vec<&String> = total_count.keys().collect();
        terms.sort_by(|a, b| {
            total_count[*b]
                .cmp(&total_count[*a])
                .then_with(|| a.cmp(b))
        });
        terms.truncate(MAX_FEATURES);
        terms.sort();
        let vocab: HashMap<String, u32> = terms
            .iter()
            .enumerate()
            .map(|(i, term)| ((*term).clone(), i as u32))
            .collect();

        let n = texts.len() as f32;
        let mut idf = vec![0f32; vocab.len()];
        for (term, &id) in &vocab {
            let df = doc_freq.get(term).copied().unwrap_or(0) as f32;
            idf[id as usize] = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
        }

        let rows = per_row
            .into_iter()
            .map(|counts| Self::vectorize(&vocab, &idf, &counts))
            .collect();

        tracing::debug!(rows = texts.len(), features = vocab.len(), "fitted TF-IDF index");
        Self { vocab, idf, rows }
    }

    fn vectorize(
        vocab: &HashMap<String, u32>,
        idf: &[f32],
        counts: &HashMap<String, u32>,
    ) -> SparseVector {
        let mut pairs: Vec<(u32, f32)> = counts
            .iter()
            .filter_map(|(term, &count)| {
                vocab
                    .get(term)
                    .map(|&id| (id, count as f32 * idf[id as usize]))
            })
            .collect();
        pairs.sort_by_key(|(id, _)| *id);
        let mut vector = SparseVector {
            indices: pairs.iter().map(|(id, _)| *id).collect(),
            values: pairs.iter().map(|(_, v)| *v).collect(),
        };
        vector.l2_normalize();
        vector
    }

    /// Transform a query into the fitted vector space.
    fn transform(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for feature in features(text) {
            *counts.entry(feature).or_insert(0) += 1;
        }
        Self::vectorize(&self.vocab, &self.idf, &counts)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cosine similarity of the query against every row.
    pub fn scores(&self, query: &str) -> Vec<f32> {
        let query_vec = self.transform(query);
        if query_vec.indices.is_empty() {
            return vec![0.0; self.len()];
        }
        let dense: HashMap<u32, f32> = query_vec
            .indices
            .iter()
            .copied()
            .zip(query_vec.values.iter().copied())
            .collect();
        self.rows.iter().map(|row| row.dot(&dense)).collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::artifact(path.display().to_string(), e))?;
        let index = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::artifact(path.display().to_string(), e))?;
        Ok(index)
    }
}

impl LexicalSearcher for TfidfIndex {
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let scores = self.scores(query);
        Ok(crate::top_k_hits(&scores, k, Strategy::Tfidf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "総人口 国勢調査".to_string(),
            "総人口 うち 日本人".to_string(),
            "完全失業率 労働力調査".to_string(),
        ]
    }

    #[test]
    fn identical_text_has_unit_cosine() {
        let index = TfidfIndex::fit(&corpus());
        let scores = index.scores("総人口 国勢調査");
        assert!((scores[0] - 1.0).abs() < 1e-5);
        assert!(scores[2].abs() < 1e-5);
    }

    #[test]
    fn bigrams_are_features() {
        let index = TfidfIndex::fit(&corpus());
        assert!(index.vocab.contains_key("総人口 国勢調査"));
        assert!(index.vocab.contains_key("総人口"));
    }

    #[test]
    fn query_with_no_known_terms_returns_no_hits() {
        let index = TfidfIndex::fit(&corpus());
        assert!(index.search("unrelated words only", 3).unwrap().is_empty());
    }

    #[test]
    fn save_load_roundtrip_preserves_scores() {
        let index = TfidfIndex::fit(&corpus());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tfidf.json");
        index.save(&path).unwrap();
        let reloaded = TfidfIndex::load(&path).unwrap();
        assert_eq!(index.scores("総人口"), reloaded.scores("総人口"));
    }

    #[test]
    fn vocabulary_cap_keeps_most_frequent_terms() {
        // A corpus with more candidate features than the cap is impractical
        // here; instead check the selection order directly.
        let texts = vec!["a a b".to_string(), "a c".to_string()];
        let index = TfidfIndex::fit(&texts);
        assert!(index.vocab.contains_key("a"));
        assert!(index.vocab.len() <= MAX_FEATURES);
    }
}
