//! Flat inner-product index with a small binary on-disk format.
//!
//! Rows are L2-normalized at insertion and queries at search time, so the
//! inner product is the cosine similarity, bounded to [-1, 1].

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use statdb_core::types::{SearchHit, Strategy};
use statdb_core::{Error, Result};

const MAGIC: [u8; 4] = *b"SDIX";
const VERSION: u32 = 1;

/// Row-major matrix of unit vectors, co-indexed with the corpus table.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    dim: usize,
    data: Vec<f32>,
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v {
            *x /= norm;
        }
    }
}

impl FlatIpIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, data: Vec::new() }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append one row vector; normalized in place before storage.
    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::Alignment(format!(
                "vector has dimension {}, index expects {}",
                vector.len(),
                self.dim
            )));
        }
        let mut row = vector.to_vec();
        l2_normalize(&mut row);
        self.data.extend_from_slice(&row);
        Ok(())
    }

    /// Inner-product top-k. The query is normalized first; ties keep row
    /// order (stable sort).
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        if self.is_empty() || query.len() != self.dim {
            return Vec::new();
        }
        let mut q = query.to_vec();
        l2_normalize(&mut q);
        let scores: Vec<f32> = self
            .data
            .chunks_exact(self.dim)
            .map(|row| row.iter().zip(&q).map(|(a, b)| a * b).sum())
            .collect();
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order
            .into_iter()
            .take(k)
            .map(|row| SearchHit { row, score: scores[row], source: Strategy::Dense })
            .collect()
    }

    /// Serialize as magic, version, dim, row count, then little-endian f32s.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut w = BufWriter::new(file);
        w.write_all(&MAGIC)?;
        w.write_all(&VERSION.to_le_bytes())?;
        w.write_all(&(self.dim as u32).to_le_bytes())?;
        w.write_all(&(self.len() as u64).to_le_bytes())?;
        for value in &self.data {
            w.write_all(&value.to_le_bytes())?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::artifact(path.display().to_string(), e))?;
        let mut r = BufReader::new(file);

        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::artifact(
                path.display().to_string(),
                "not a dense index file",
            ));
        }
        let mut u32_buf = [0u8; 4];
        r.read_exact(&mut u32_buf)?;
        let version = u32::from_le_bytes(u32_buf);
        if version != VERSION {
            return Err(Error::artifact(
                path.display().to_string(),
                format!("unsupported version {version}"),
            ));
        }
        r.read_exact(&mut u32_buf)?;
        let dim = u32::from_le_bytes(u32_buf) as usize;
        let mut u64_buf = [0u8; 8];
        r.read_exact(&mut u64_buf)?;
        let rows = u64::from_le_bytes(u64_buf) as usize;

        let mut data = vec![0f32; rows * dim];
        let mut f32_buf = [0u8; 4];
        for value in &mut data {
            r.read_exact(&mut f32_buf)?;
            *value = f32::from_le_bytes(f32_buf);
        }
        Ok(Self { dim, data })
    }
}
