#![deny(warnings)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Embedding backends for the dense index.
//!
//! The real backend speaks the OpenAI-compatible `/embeddings` wire format
//! over HTTP (Ollama serves the same shape). A deterministic hashing
//! embedder is provided for tests and offline builds, selected via
//! `STATDB_USE_HASH_EMBEDDINGS` or `embedding.provider = "hash"`.

pub mod hash;
pub mod http;

pub use hash::HashEmbedder;
pub use http::HttpEmbedder;
pub use statdb_core::traits::Embedder;

use statdb_core::config::Config;

/// Dimension of the hashing embedder; matches text-embedding-3-small so
/// artifacts built offline stay drop-in compatible.
pub const HASH_EMBEDDER_DIM: usize = 1536;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Build the embedder named by config/env.
pub fn get_default_embedder(config: &Config) -> anyhow::Result<Box<dyn Embedder>> {
    let use_hash = std::env::var("STATDB_USE_HASH_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
        || config.get_or::<String>("embedding.provider", String::new()) == "hash";
    if use_hash {
        tracing::info!("using deterministic hashing embedder");
        return Ok(Box::new(HashEmbedder::new(HASH_EMBEDDER_DIM)));
    }

    let endpoint = config.get_or("embedding.endpoint", DEFAULT_ENDPOINT.to_string());
    let model = config.get_or("embedding.model", DEFAULT_MODEL.to_string());
    let timeout_secs = config.get_or("embedding.timeout_secs", DEFAULT_TIMEOUT_SECS);
    let api_key = config
        .get::<String>("embedding.api_key")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    let embedder = HttpEmbedder::new(&endpoint, &model, api_key, timeout_secs)?;
    tracing::info!(endpoint = %endpoint, model = %model, "using HTTP embedder");
    Ok(Box::new(embedder))
}
