//! Okapi BM25 over whitespace-tokenized descriptive text.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use statdb_core::text::tokenize;
use statdb_core::traits::LexicalSearcher;
use statdb_core::types::{SearchHit, Strategy};
use statdb_core::{Error, Result};

pub const DEFAULT_K1: f32 = 1.5;
pub const DEFAULT_B: f32 = 0.75;
/// Floor applied to negative idf values, as a fraction of the average idf.
const IDF_EPSILON: f32 = 0.25;

/// A fitted BM25 model. Row order matches the corpus it was fitted from.
#[derive(Debug, Serialize, Deserialize)]
pub struct Bm25Index {
    k1: f32,
    b: f32,
    avgdl: f32,
    doc_len: Vec<u32>,
    term_freqs: Vec<HashMap<String, u32>>,
    idf: HashMap<String, f32>,
}

impl Bm25Index {
    /// Fit the model over one descriptive text per row.
    pub fn fit(texts: &[String]) -> Self {
        let mut doc_len = Vec::with_capacity(texts.len());
        let mut term_freqs: Vec<HashMap<String, u32>> = Vec::with_capacity(texts.len());
        let mut doc_freq: HashMap<String, u32> = HashMap::new();

        for text in texts {
            let mut freqs: HashMap<String, u32> = HashMap::new();
            let mut len = 0u32;
            for token in tokenize(text) {
                *freqs.entry(token.to_string()).or_insert(0) += 1;
                len += 1;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            doc_len.push(len);
            term_freqs.push(freqs);
        }

        let n = texts.len() as f32;
        let avgdl = if texts.is_empty() {
            0.0
        } else {
            doc_len.iter().sum::<u32>() as f32 / n
        };

        // Okapi idf can go negative for very common terms; clamp those to a
        // small positive floor derived from the average idf.
        let mut idf: HashMap<String, f32> = HashMap::with_capacity(doc_freq.len());
        let mut idf_sum = 0.0f32;
        let mut negative: Vec<String> = Vec::new();
        for (term, df) in &doc_freq {
            let value = ((n - *df as f32 + 0.5) / (*df as f32 + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term.clone(), value);
        }
        if !idf.is_empty() {
            let floor = IDF_EPSILON * (idf_sum / idf.len() as f32);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        tracing::debug!(rows = texts.len(), vocab = idf.len(), "fitted BM25 index");
        Self { k1: DEFAULT_K1, b: DEFAULT_B, avgdl, doc_len, term_freqs, idf }
    }

    pub fn len(&self) -> usize {
        self.doc_len.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_len.is_empty()
    }

    /// BM25 score of every row for the given query tokens.
    pub fn scores(&self, query_tokens: &[&str]) -> Vec<f32> {
        let mut scores = vec![0f32; self.len()];
        if self.avgdl <= 0.0 {
            return scores;
        }
        for token in query_tokens {
            let Some(&idf) = self.idf.get(*token) else { continue };
            for (row, freqs) in self.term_freqs.iter().enumerate() {
                let Some(&tf) = freqs.get(*token) else { continue };
                let tf = tf as f32;
                let dl = self.doc_len[row] as f32;
                let denom = tf + self.k1 * (1.0 - self.b + self.b * dl / self.avgdl);
                scores[row] += idf * tf * (self.k1 + 1.0) / denom;
            }
        }
        scores
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

impl LexicalSearcher for Bm25Index {
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let tokens: Vec<&str> = tokenize(query).collect();
        let scores = self.scores(&tokens);
        Ok(crate::top_k_hits(&scores, k, Strategy::Bm25))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "総人口 人口 国勢調査".to_string(),
            "総人口 うち 日本人 国勢調査".to_string(),
            "完全失業率 労働力 調査".to_string(),
            "出生率 人口 動態".to_string(),
        ]
    }

    #[test]
    fn matching_terms_rank_first() {
        let index = Bm25Index::fit(&corpus());
        let hits = index.search("完全失業率", 4).unwrap();
        assert_eq!(hits[0].row, 2);
        assert!(hits[0].score > 0.0);
        assert_eq!(hits[0].source, Strategy::Bm25);
    }

    #[test]
    fn rarer_term_outscores_common_term() {
        let index = Bm25Index::fit(&corpus());
        let scores = index.scores(&["日本人", "総人口"]);
        // Row 1 has both terms, row 0 only the common one.
        assert!(scores[1] > scores[0]);
    }

    #[test]
    fn empty_query_returns_no_hits() {
        let index = Bm25Index::fit(&corpus());
        assert!(index.search("", 4).unwrap().is_empty());
    }

    #[test]
    fn save_load_roundtrip_preserves_ranking() {
        let index = Bm25Index::fit(&corpus());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bm25.json");
        index.save(&path).unwrap();
        let reloaded = Bm25Index::load(&path).unwrap();
        assert_eq!(reloaded.len(), index.len());
        let a = index.search("総人口 国勢調査", 4).unwrap();
        let b = reloaded.search("総人口 国勢調査", 4).unwrap();
        let rows = |hs: &[SearchHit]| hs.iter().map(|h| h.row).collect::<Vec<_>>();
        assert_eq!(rows(&a), rows(&b));
    }
}
