#![deny(warnings)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Dense retrieval: a flat inner-product index over L2-normalized
//! embeddings, plus the fail-closed query wrapper that owns the embedder.

pub mod flat;
pub mod index;

pub use flat::FlatIpIndex;
pub use index::DenseIndex;
