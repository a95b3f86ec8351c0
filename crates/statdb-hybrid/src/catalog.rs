//! Convenience view for the conversational collaborator: indicator names
//! grouped by top-level category, padded with same-category neighbors.
//! Purely a view over `hybrid_search`; adds no ranking logic.

use std::collections::{HashMap, HashSet};

use crate::engine::HybridSearchEngine;

/// How many search results feed the catalog view.
pub const CATALOG_FETCH: usize = 40;
/// Extra same-category names appended per group.
pub const SUPPLEMENT_PER_FIELD: usize = 10;
/// Names shown per category when rendering for a prompt.
const RENDER_NAMES_PER_FIELD: usize = 15;

/// Indicator names available in one top-level category.
#[derive(Debug, Clone)]
pub struct FieldIndicators {
    pub field: String,
    pub names: Vec<String>,
}

impl HybridSearchEngine {
    /// Group search results by top-level category (first-seen order), then
    /// supplement each group with up to [`SUPPLEMENT_PER_FIELD`] additional
    /// indicator names from the same category.
    pub fn available_indicators(&self, query: &str) -> Vec<FieldIndicators> {
        let results = self.hybrid_search(query, CATALOG_FETCH);

        let mut groups: Vec<FieldIndicators> = Vec::new();
        let mut by_field: HashMap<String, usize> = HashMap::new();
        for result in results {
            let slot = *by_field.entry(result.field.clone()).or_insert_with(|| {
                groups.push(FieldIndicators { field: result.field.clone(), names: Vec::new() });
                groups.len() - 1
            });
            groups[slot].names.push(result.full_name);
        }

        for group in &mut groups {
            let existing: HashSet<&str> = group.names.iter().map(String::as_str).collect();
            let additional: Vec<String> = self
                .store()
                .rows_in_field(&group.field)
                .map(|row| row.full_name.clone())
                .filter(|name| !existing.contains(name.as_str()))
                .take(SUPPLEMENT_PER_FIELD)
                .collect();
            group.names.extend(additional);
        }
        groups
    }
}

/// Render the catalog as one line per category for an LLM prompt.
pub fn render_catalog(groups: &[FieldIndicators]) -> String {
    groups
        .iter()
        .map(|group| {
            let shown: Vec<&str> = group
                .names
                .iter()
                .take(RENDER_NAMES_PER_FIELD)
                .map(String::as_str)
                .collect();
            format!(
                "【{}】({}件利用可能): {}",
                group.field,
                group.names.len(),
                shown.join(", ")
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}
