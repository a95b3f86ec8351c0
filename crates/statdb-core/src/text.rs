//! Tokenization shared by the lexical indexes and the re-ranker.
//!
//! Tokenization is a naive whitespace split. That is a deliberate
//! simplification: the corpus is largely Japanese, which does not delimit
//! words with whitespace, so lexical recall leans on the dense index and on
//! the substring re-ranking pass. Queries and corpus text are tokenized the
//! same way, which keeps BM25 and TF-IDF self-consistent.

/// Placeholder used when a row has no descriptive text at all.
pub const EMPTY_TEXT_PLACEHOLDER: &str = "統計指標";

/// Whitespace tokenization, identical for corpus text and queries.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_any_whitespace() {
        let tokens: Vec<&str> = tokenize("総人口  15歳未満\t人口").collect();
        assert_eq!(tokens, vec!["総人口", "15歳未満", "人口"]);
    }

    #[test]
    fn empty_string_yields_no_tokens() {
        assert_eq!(tokenize("").count(), 0);
        assert_eq!(tokenize("   ").count(), 0);
    }
}
