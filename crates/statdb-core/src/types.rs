//! Domain types shared by the dense, lexical and hybrid engines.

use serde::{Deserialize, Serialize};

use crate::text;

/// Positional row identifier. All indexes are built from, and queried
/// against, the same row ordering, so a `RowId` is meaningful across the
/// corpus table and every index artifact.
pub type RowId = usize;

/// Length of the `code` prefix that clusters related indicators into one
/// logical group (granular breakdowns of a base measure).
pub const GROUP_PREFIX_LEN: usize = 5;

/// One named statistical indicator.
///
/// - `code`: stable unique identifier, sortable
/// - `name`/`full_name`: short and complete display names
/// - `field`/`subfield`/`subsubfield`: three-level category path
/// - `definition`: free text, may be empty
/// - `source_name`: originating statistical series
/// - `group_code`: derived prefix of `code`, see [`GROUP_PREFIX_LEN`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub code: String,
    pub name: String,
    pub full_name: String,
    pub field: String,
    pub subfield: String,
    pub subsubfield: String,
    #[serde(default)]
    pub definition: String,
    pub source_name: String,
    pub group_code: String,
}

impl IndicatorRow {
    /// Derive the group code for a given indicator code.
    pub fn derive_group_code(code: &str) -> String {
        code.chars().take(GROUP_PREFIX_LEN).collect()
    }

    /// The descriptive text indexed by all three search strategies.
    pub fn search_text(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.full_name,
            self.field,
            self.subfield,
            self.subsubfield,
            self.definition,
            self.source_name
        )
    }

    /// Descriptive text for the dense index. Blank text is coerced to a
    /// placeholder so no row embeds to a degenerate zero vector.
    pub fn embedding_text(&self) -> String {
        let text = self.search_text();
        if text.trim().is_empty() {
            text::EMPTY_TEXT_PLACEHOLDER.to_string()
        } else {
            text
        }
    }

    /// The six fields scored by the re-ranking heuristic.
    pub fn text_fields(&self) -> [&str; 6] {
        [
            &self.full_name,
            &self.field,
            &self.subfield,
            &self.subsubfield,
            &self.definition,
            &self.source_name,
        ]
    }
}

/// Indicates which retrieval strategy produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Strategy {
    Dense,
    Bm25,
    Tfidf,
}

impl Strategy {
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Dense => "dense",
            Strategy::Bm25 => "bm25",
            Strategy::Tfidf => "tfidf",
        }
    }
}

/// The minimal surface returned by every index.
///
/// `row` is a position into the corpus table. `score` is strategy-specific
/// but higher is always better. `source` labels the origin strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchHit {
    pub row: RowId,
    pub score: f32,
    pub source: Strategy,
}

/// One entry of the final, fused and deduplicated result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedIndicator {
    pub full_name: String,
    pub field: String,
    pub subfield: String,
    pub subsubfield: String,
    pub code: String,
    pub group_code: String,
    pub score: f32,
}

impl RankedIndicator {
    pub fn from_row(row: &IndicatorRow, score: f32) -> Self {
        Self {
            full_name: row.full_name.clone(),
            field: row.field.clone(),
            subfield: row.subfield.clone(),
            subsubfield: row.subsubfield.clone(),
            code: row.code.clone(),
            group_code: row.group_code.clone(),
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, full_name: &str, definition: &str) -> IndicatorRow {
        IndicatorRow {
            code: code.to_string(),
            name: full_name.to_string(),
            full_name: full_name.to_string(),
            field: "人口・世帯".to_string(),
            subfield: "人口".to_string(),
            subsubfield: "年齢構成".to_string(),
            definition: definition.to_string(),
            source_name: "国勢調査".to_string(),
            group_code: IndicatorRow::derive_group_code(code),
        }
    }

    #[test]
    fn group_code_is_five_char_prefix() {
        assert_eq!(IndicatorRow::derive_group_code("A1101001"), "A1101");
        assert_eq!(IndicatorRow::derive_group_code("A11"), "A11");
    }

    #[test]
    fn search_text_joins_all_six_fields_in_order() {
        let r = row("A1101", "高齢化率", "65歳以上人口の割合");
        assert_eq!(
            r.search_text(),
            "高齢化率 人口・世帯 人口 年齢構成 65歳以上人口の割合 国勢調査"
        );
    }

    #[test]
    fn embedding_text_falls_back_to_placeholder_when_blank() {
        let mut r = row("A1101", "", "");
        r.field.clear();
        r.subfield.clear();
        r.subsubfield.clear();
        r.source_name.clear();
        assert_eq!(r.embedding_text(), text::EMPTY_TEXT_PLACEHOLDER);
    }
}
