#![deny(warnings)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Hybrid retrieval over the indicator corpus: artifact loading, the
//! fusion/re-rank/dedup engine, the catalog view for the conversational
//! collaborator, and the offline index builder.

pub mod artifacts;
pub mod builder;
pub mod catalog;
pub mod engine;
pub mod store;

pub use artifacts::{ArtifactSource, BuildMetadata};
pub use builder::IndexBuilder;
pub use catalog::FieldIndicators;
pub use engine::{HybridSearchEngine, SearchSettings};
pub use store::CorpusStore;
