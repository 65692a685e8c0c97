use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ticketdesk_core::config::EmbeddingConfig;
use ticketdesk_core::traits::Embedder;

use crate::pool::l2_normalize;

/// Embeddings over an OpenAI-compatible `POST {base_url}/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dim: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn from_config(cfg: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building embeddings HTTP client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key: std::env::var(&cfg.api_key_env).ok().filter(|k| !k.is_empty()),
            dim: cfg.dim,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let url = format!("{}/embeddings", self.base_url);
        let mut request = self
            .client
            .post(&url)
            .json(&EmbeddingRequest { model: &self.model, input: texts, encoding_format: "float" });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.with_context(|| format!("POST {url}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("embeddings endpoint returned {status}: {body}"));
        }
        let mut parsed: EmbeddingResponse = response.json().await.context("decoding embeddings response")?;
        if parsed.data.len() != texts.len() {
            return Err(anyhow!("expected {} embeddings, got {}", texts.len(), parsed.data.len()));
        }
        parsed.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = parsed
            .data
            .into_iter()
            .map(|d| {
                let mut v = d.embedding;
                l2_normalize(&mut v);
                v
            })
            .collect();
        debug!(count = vectors.len(), model = %self.model, "embedded batch");
        Ok(vectors)
    }
}
