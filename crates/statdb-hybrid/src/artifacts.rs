//! The five co-indexed build artifacts and how to obtain them.
//!
//! A build produces, in one row order: the indicator table, the dense
//! index binary, the BM25 model, the TF-IDF model, and a metadata
//! descriptor. They are loaded together from a local directory, or fetched
//! once from a remote base URL into a process-wide cache directory.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

use twox_hash::XxHash64;

use serde::{Deserialize, Serialize};

use statdb_core::config::{expand_path, Config};
use statdb_core::{Error, Result};

pub const INDICATORS_FILE: &str = "indicators.json";
pub const DENSE_INDEX_FILE: &str = "dense_index.bin";
pub const BM25_FILE: &str = "bm25.json";
pub const TFIDF_FILE: &str = "tfidf.json";
pub const METADATA_FILE: &str = "metadata.json";

pub const ALL_FILES: [&str; 5] = [
    INDICATORS_FILE,
    DENSE_INDEX_FILE,
    BM25_FILE,
    TFIDF_FILE,
    METADATA_FILE,
];

const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Descriptor written at build time and validated at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub created_at: String,
    pub total_records: usize,
    pub embedding_model: String,
    pub vector_dimension: usize,
}

impl BuildMetadata {
    pub fn save(&self, dir: &Path) -> Result<()> {
        let file = std::fs::File::create(dir.join(METADATA_FILE))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(METADATA_FILE);
        let file = std::fs::File::open(&path)
            .map_err(|e| Error::artifact(path.display().to_string(), e))?;
        let meta = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::artifact(path.display().to_string(), e))?;
        Ok(meta)
    }
}

/// Where the artifacts come from.
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    /// A directory already holding all five files.
    Dir(PathBuf),
    /// A base URL serving the five files; downloaded once into a cache
    /// directory and reused for the process lifetime.
    Url(String),
}

impl ArtifactSource {
    /// Resolve the source from configuration. A configured URL wins over a
    /// directory, so deployments that publish the artifact bundle as a
    /// release download need no local build step.
    pub fn from_config(config: &Config) -> Self {
        if let Ok(url) = config.get::<String>("artifacts.base_url") {
            if !url.trim().is_empty() {
                return ArtifactSource::Url(url);
            }
        }
        let dir = config.get_or("artifacts.dir", "vector_db".to_string());
        ArtifactSource::Dir(expand_path(dir))
    }

    /// Produce a local directory containing all five artifacts.
    ///
    /// Idempotent: an existing complete cache (or directory) is returned
    /// without touching the network.
    pub fn materialize(&self) -> Result<PathBuf> {
        match self {
            ArtifactSource::Dir(dir) => {
                for name in ALL_FILES {
                    let path = dir.join(name);
                    if !path.exists() {
                        return Err(Error::artifact(
                            path.display().to_string(),
                            "missing artifact file",
                        ));
                    }
                }
                Ok(dir.clone())
            }
            ArtifactSource::Url(base) => {
                let cache = cache_dir(base);
                std::fs::create_dir_all(&cache)?;
                let base = base.trim_end_matches('/');
                for name in ALL_FILES {
                    let dest = cache.join(name);
                    if dest.exists() {
                        continue;
                    }
                    download(&format!("{base}/{name}"), &dest)?;
                }
                Ok(cache)
            }
        }
    }
}

/// Cache directory for one base URL. Keyed by a hash of the URL so files
/// fetched from one release can never be served for another.
fn cache_dir(base: &str) -> PathBuf {
    let mut hasher = XxHash64::with_seed(0);
    base.trim_end_matches('/').hash(&mut hasher);
    std::env::temp_dir().join(format!("statdb-artifacts-{:016x}", hasher.finish()))
}

fn download(url: &str, dest: &Path) -> Result<()> {
    tracing::info!(url, "downloading artifact");
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .build()
        .map_err(|e| Error::artifact(url, e))?;
    let response = client.get(url).send().map_err(|e| Error::artifact(url, e))?;
    if !response.status().is_success() {
        return Err(Error::artifact(
            url,
            format!("HTTP status {}", response.status()),
        ));
    }
    let bytes = response.bytes().map_err(|e| Error::artifact(url, e))?;
    // Write to a temp name first so a partial download never looks like a
    // cached artifact.
    let partial = dest.with_extension("partial");
    std::fs::write(&partial, &bytes)?;
    std::fs::rename(&partial, dest)?;
    tracing::info!(url, bytes = bytes.len(), "artifact cached");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_source_requires_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = ArtifactSource::Dir(dir.path().to_path_buf());
        assert!(source.materialize().is_err());

        for name in ALL_FILES {
            std::fs::write(dir.path().join(name), b"{}").unwrap();
        }
        assert_eq!(source.materialize().unwrap(), dir.path());
    }

    #[test]
    fn url_cache_is_keyed_by_base_url() {
        let a = cache_dir("http://releases.example/v1");
        let b = cache_dir("http://releases.example/v2");
        assert_ne!(a, b);
        // Trailing slash is not a distinct release.
        assert_eq!(a, cache_dir("http://releases.example/v1/"));
    }

    #[test]
    fn complete_cache_for_same_url_is_reused_without_refetch() {
        // An unresolvable host: any download attempt would fail, so a
        // successful materialize proves the cache was served as-is.
        let base = "http://statdb.invalid/artifacts";
        let cache = cache_dir(base);
        std::fs::create_dir_all(&cache).unwrap();
        for name in ALL_FILES {
            std::fs::write(cache.join(name), b"{}").unwrap();
        }
        let dir = ArtifactSource::Url(base.to_string()).materialize().unwrap();
        assert_eq!(dir, cache);
        std::fs::remove_dir_all(&cache).ok();
    }

    #[test]
    fn metadata_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let meta = BuildMetadata {
            created_at: "2024-01-01T00:00:00Z".to_string(),
            total_records: 3,
            embedding_model: "hash-embedder".to_string(),
            vector_dimension: 64,
        };
        meta.save(dir.path()).unwrap();
        let loaded = BuildMetadata::load(dir.path()).unwrap();
        assert_eq!(loaded.total_records, 3);
        assert_eq!(loaded.vector_dimension, 64);
    }
}
