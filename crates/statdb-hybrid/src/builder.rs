//! Offline index builder: joins the two source tables, embeds the
//! descriptive text in batches, fits the lexical models, and writes the
//! five artifacts in one shared row order.

use std::collections::HashMap;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use statdb_core::types::IndicatorRow;
use statdb_core::{Error, Result};
use statdb_dense::FlatIpIndex;
use statdb_embed::Embedder;
use statdb_lexical::{Bm25Index, TfidfIndex};

use crate::artifacts::{BuildMetadata, BM25_FILE, DENSE_INDEX_FILE, INDICATORS_FILE, TFIDF_FILE};

const DEFAULT_BATCH_SIZE: usize = 100;
/// Probe text for the pre-build embedding self-check.
const PROBE_TEXT: &str = "テスト";

/// One record of the master indicator table.
#[derive(Debug, Deserialize)]
struct MasterRecord {
    koumoku_code: String,
    koumoku_name: String,
    koumoku_name_full: String,
    bunya_name: String,
    chuubunrui_name: String,
    shoubunrui_name: String,
    stat_name: String,
}

/// One record of the indicator definitions table.
#[derive(Debug, Deserialize)]
struct DefinitionRecord {
    koumoku_code: String,
    #[serde(default)]
    definition: String,
}

pub struct IndexBuilder {
    embedder: Box<dyn Embedder>,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self { embedder, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embed a probe string to confirm the embedding service is usable
    /// before committing to a long build. Returns the vector dimension.
    pub fn verify_embedder(&self) -> Result<usize> {
        let vectors = self
            .embedder
            .embed_batch(&[PROBE_TEXT.to_string()])
            .map_err(|e| Error::Embedding(e.to_string()))?;
        match vectors.first() {
            Some(v) if !v.is_empty() => Ok(v.len()),
            _ => Err(Error::Embedding("probe embedding came back empty".to_string())),
        }
    }

    /// Read the two source CSVs and LEFT JOIN definitions onto the master
    /// table by indicator code. Master row order is preserved; it becomes
    /// the row order of every artifact.
    pub fn load_rows(master_csv: &Path, definitions_csv: &Path) -> Result<Vec<IndicatorRow>> {
        let mut definitions: HashMap<String, String> = HashMap::new();
        let mut def_reader = csv::Reader::from_path(definitions_csv)
            .map_err(|e| Error::artifact(definitions_csv.display().to_string(), e))?;
        for record in def_reader.deserialize() {
            let record: DefinitionRecord =
                record.map_err(|e| Error::artifact(definitions_csv.display().to_string(), e))?;
            definitions.insert(record.koumoku_code, record.definition);
        }

        let mut rows = Vec::new();
        let mut master_reader = csv::Reader::from_path(master_csv)
            .map_err(|e| Error::artifact(master_csv.display().to_string(), e))?;
        for record in master_reader.deserialize() {
            let record: MasterRecord =
                record.map_err(|e| Error::artifact(master_csv.display().to_string(), e))?;
            let definition = definitions.get(&record.koumoku_code).cloned().unwrap_or_default();
            rows.push(IndicatorRow {
                group_code: IndicatorRow::derive_group_code(&record.koumoku_code),
                code: record.koumoku_code,
                name: record.koumoku_name,
                full_name: record.koumoku_name_full,
                field: record.bunya_name,
                subfield: record.chuubunrui_name,
                subsubfield: record.shoubunrui_name,
                definition,
                source_name: record.stat_name,
            });
        }
        tracing::info!(rows = rows.len(), definitions = definitions.len(), "source tables joined");
        Ok(rows)
    }

    /// Build and persist all five artifacts into `out_dir`.
    pub fn build(&self, rows: &[IndicatorRow], out_dir: &Path) -> Result<BuildMetadata> {
        if rows.is_empty() {
            return Err(Error::Operation("no rows to index".to_string()));
        }
        std::fs::create_dir_all(out_dir)?;

        let search_texts: Vec<String> = rows.iter().map(IndicatorRow::search_text).collect();
        let embedding_texts: Vec<String> = rows.iter().map(IndicatorRow::embedding_text).collect();

        let flat = self.embed_all(&embedding_texts)?;
        let bm25 = Bm25Index::fit(&search_texts);
        let tfidf = TfidfIndex::fit(&search_texts);

        let file = std::fs::File::create(out_dir.join(INDICATORS_FILE))?;
        serde_json::to_writer(std::io::BufWriter::new(file), rows)?;
        flat.save(&out_dir.join(DENSE_INDEX_FILE))?;
        bm25.save(&out_dir.join(BM25_FILE))?;
        tfidf.save(&out_dir.join(TFIDF_FILE))?;

        let metadata = BuildMetadata {
            created_at: chrono::Utc::now().to_rfc3339(),
            total_records: rows.len(),
            embedding_model: self.embedder.model().to_string(),
            vector_dimension: flat.dim(),
        };
        metadata.save(out_dir)?;
        tracing::info!(
            rows = rows.len(),
            dim = flat.dim(),
            out_dir = %out_dir.display(),
            "artifacts written"
        );
        Ok(metadata)
    }

    /// Embed every row in batches, with a progress bar for long builds.
    fn embed_all(&self, texts: &[String]) -> Result<FlatIpIndex> {
        let dim = self.verify_embedder()?;
        let mut flat = FlatIpIndex::new(dim);

        let pb = ProgressBar::new(texts.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({percent}%) {msg}")
                .map_err(|e| Error::Operation(e.to_string()))?
                .progress_chars("#>-"),
        );

        for batch in texts.chunks(self.batch_size) {
            let vectors = self
                .embedder
                .embed_batch(batch)
                .map_err(|e| Error::Embedding(e.to_string()))?;
            if vectors.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "got {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            for vector in &vectors {
                flat.add(vector)?;
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("embeddings complete");
        Ok(flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use statdb_embed::HashEmbedder;

    fn write_sources(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let master = dir.join("master.csv");
        let defs = dir.join("definitions.csv");
        let mut f = std::fs::File::create(&master).unwrap();
        writeln!(f, "koumoku_code,koumoku_name,koumoku_name_full,bunya_name,chuubunrui_name,shoubunrui_name,stat_name").unwrap();
        writeln!(f, "A1101,総人口,総人口,人口・世帯,人口,総数,国勢調査").unwrap();
        writeln!(f, "A110101,総人口（男）,総人口（男）,人口・世帯,人口,総数,国勢調査").unwrap();
        writeln!(f, "F1102,完全失業率,完全失業率,労働,就業,失業,労働力調査").unwrap();
        let mut f = std::fs::File::create(&defs).unwrap();
        writeln!(f, "koumoku_code,definition").unwrap();
        writeln!(f, "A1101,調査時の常住人口").unwrap();
        (master, defs)
    }

    #[test]
    fn load_rows_left_joins_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let (master, defs) = write_sources(dir.path());
        let rows = IndexBuilder::load_rows(&master, &defs).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].definition, "調査時の常住人口");
        assert_eq!(rows[1].definition, "");
        assert_eq!(rows[0].group_code, "A1101");
        assert_eq!(rows[1].group_code, "A1101");
        assert_eq!(rows[2].group_code, "F1102");
    }

    #[test]
    fn build_writes_all_five_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (master, defs) = write_sources(dir.path());
        let rows = IndexBuilder::load_rows(&master, &defs).unwrap();
        let out = dir.path().join("vector_db");

        let builder = IndexBuilder::new(Box::new(HashEmbedder::new(64))).with_batch_size(2);
        let metadata = builder.build(&rows, &out).unwrap();

        assert_eq!(metadata.total_records, 3);
        assert_eq!(metadata.vector_dimension, 64);
        for name in crate::artifacts::ALL_FILES {
            assert!(out.join(name).exists(), "missing {name}");
        }
    }

    #[test]
    fn build_rejects_empty_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let builder = IndexBuilder::new(Box::new(HashEmbedder::new(8)));
        assert!(builder.build(&[], dir.path()).is_err());
    }
}
