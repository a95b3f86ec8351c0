//! HTTP embedding client, OpenAI-compatible `/embeddings` wire format.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use reqwest::blocking::Client;
use serde::Deserialize;

use statdb_core::traits::Embedder;

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }
}

impl Embedder for HttpEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let started = Instant::now();
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().context("embedding request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("embedding service returned {status}"));
        }
        let parsed: EmbeddingsResponse = response
            .json()
            .context("malformed embedding response")?;
        if parsed.data.len() != texts.len() {
            return Err(anyhow!(
                "embedding service returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            ));
        }
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|item| item.embedding).collect();
        if vectors.iter().any(Vec::is_empty) {
            return Err(anyhow!("embedding service returned an empty vector"));
        }
        tracing::debug!(
            count = texts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "embedding batch completed"
        );
        Ok(vectors)
    }
}
