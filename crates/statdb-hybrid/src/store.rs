//! In-memory corpus of indicator rows, loaded once and read-only after.

use std::collections::HashSet;
use std::path::Path;

use statdb_core::types::{IndicatorRow, RowId};
use statdb_core::{Error, Result};

use crate::artifacts::INDICATORS_FILE;

/// The flattened indicator table. Row positions are the shared identity
/// across the dense, BM25 and TF-IDF artifacts.
pub struct CorpusStore {
    rows: Vec<IndicatorRow>,
}

impl CorpusStore {
    /// Wrap an already-materialized table, rejecting duplicate codes.
    pub fn from_rows(rows: Vec<IndicatorRow>) -> Result<Self> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert(&row.code) {
                return Err(Error::Alignment(format!(
                    "duplicate indicator code '{}'",
                    row.code
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Load the indicator table artifact from a directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INDICATORS_FILE);
        let file = std::fs::File::open(&path)
            .map_err(|e| Error::artifact(path.display().to_string(), e))?;
        let rows: Vec<IndicatorRow> = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::artifact(path.display().to_string(), e))?;
        tracing::info!(rows = rows.len(), "corpus table loaded");
        Self::from_rows(rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, id: RowId) -> Option<&IndicatorRow> {
        self.rows.get(id)
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    /// All rows in a top-level category, in corpus order.
    pub fn rows_in_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a IndicatorRow> {
        self.rows.iter().filter(move |row| row.field == field)
    }

    /// Members of a logical group, ordered by `code`.
    pub fn group_members(&self, group_code: &str) -> Vec<&IndicatorRow> {
        let mut members: Vec<&IndicatorRow> = self
            .rows
            .iter()
            .filter(|row| row.group_code == group_code)
            .collect();
        members.sort_by(|a, b| a.code.cmp(&b.code));
        members
    }

    /// The group representative: the row whose `code` equals the group
    /// code exactly, else the first member in `code` order.
    pub fn representative(&self, group_code: &str) -> Option<&IndicatorRow> {
        let members = self.group_members(group_code);
        members
            .iter()
            .find(|row| row.code == group_code)
            .copied()
            .or_else(|| members.first().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, field: &str) -> IndicatorRow {
        IndicatorRow {
            code: code.to_string(),
            name: format!("指標{code}"),
            full_name: format!("指標{code}"),
            field: field.to_string(),
            subfield: String::new(),
            subsubfield: String::new(),
            definition: String::new(),
            source_name: String::new(),
            group_code: IndicatorRow::derive_group_code(code),
        }
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let rows = vec![row("A1101", "人口"), row("A1101", "人口")];
        assert!(CorpusStore::from_rows(rows).is_err());
    }

    #[test]
    fn representative_prefers_exact_code_match() {
        let store = CorpusStore::from_rows(vec![
            row("A110102", "人口"),
            row("A1101", "人口"),
            row("A110101", "人口"),
        ])
        .unwrap();
        assert_eq!(store.representative("A1101").unwrap().code, "A1101");
    }

    #[test]
    fn representative_falls_back_to_first_member_by_code() {
        let store = CorpusStore::from_rows(vec![
            row("A110103", "人口"),
            row("A110101", "人口"),
        ])
        .unwrap();
        assert_eq!(store.representative("A1101").unwrap().code, "A110101");
        assert!(store.representative("Z9999").is_none());
    }

    #[test]
    fn rows_in_field_filters_by_top_level_category() {
        let store = CorpusStore::from_rows(vec![
            row("A1101", "人口"),
            row("B1101", "労働"),
            row("A2201", "人口"),
        ])
        .unwrap();
        let codes: Vec<&str> = store.rows_in_field("人口").map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["A1101", "A2201"]);
    }
}
