use crate::types::SearchHit;

/// Produces one fixed-dimension vector per input text.
///
/// Implementations must return one vector per input, all of the same
/// length. Errors are propagated; the dense index decides how to degrade.
pub trait Embedder: Send + Sync {
    /// Model identifier recorded in build metadata.
    fn model(&self) -> &str;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// A read-only lexical index queried during hybrid search.
///
/// Failures are surfaced as typed errors here and converted into an empty
/// contribution at the engine boundary, so one broken strategy never aborts
/// a whole query.
pub trait LexicalSearcher: Send + Sync {
    fn search(&self, query: &str, k: usize) -> crate::Result<Vec<SearchHit>>;
}
