//! Embedding client
//!
//! Modeled the same way as the reranker (§4.10): an opaque remote HTTP
//! service rather than an in-process model. The workflow only needs a
//! `Vec<f32>` for a piece of text; it does not care whether that vector came
//! from a sentence-transformer running in-process or a sidecar service.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::RagError;

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub embedding_dim: usize,
    pub normalize: bool,
    pub timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8009/embed".to_string(),
            model: "keepitreal/vietnamese-sbert".to_string(),
            embedding_dim: 1024,
            normalize: true,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Turns text into a dense vector. Embedding failure is non-fatal at the
/// branch level (§5: the Retriever and FAQ branches fall back to empty
/// results on timeout) but the client itself never silently substitutes a
/// different vector shape — dimension reconciliation happens downstream in
/// the vector-store adapter, not here.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

pub struct HttpEmbedder {
    client: Client,
    config: EmbeddingConfig,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    inputs: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingClient for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        Ok(self.embed_batch(&[text]).await?.remove(0))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        let request = EmbedRequest {
            model: &self.config.model,
            inputs: texts.to_vec(),
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!("HTTP {status}: {body}")));
        }

        let mut parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        if self.config.normalize {
            for vector in &mut parsed.embeddings {
                normalize(vector);
            }
        }

        Ok(parsed.embeddings)
    }
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Deterministic hash-based embedder for tests and offline development —
/// never used in production unless explicitly wired in, same rule as
/// `SimpleScorer` in `reranker`.
pub struct SimpleEmbedder {
    config: EmbeddingConfig,
}

impl SimpleEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.config.embedding_dim];

        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % self.config.embedding_dim;
            embedding[idx] += 1.0;
        }

        if self.config.normalize {
            normalize(&mut embedding);
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for SimpleEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        Ok(self.embed(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_embedder_produces_normalized_vector() {
        let embedder = SimpleEmbedder::new(EmbeddingConfig::default());
        let embedding = embedder.embed("Xin chào");

        assert_eq!(embedding.len(), 1024);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn simple_embedder_is_deterministic() {
        let embedder = SimpleEmbedder::new(EmbeddingConfig::default());
        assert_eq!(
            embedder.embed("lãi suất vay"),
            embedder.embed("lãi suất vay")
        );
    }

    #[tokio::test]
    async fn embedding_client_trait_default_batch_preserves_order() {
        struct Echo;

        #[async_trait::async_trait]
        impl EmbeddingClient for Echo {
            async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
                Ok(vec![text.len() as f32])
            }
        }

        let echo = Echo;
        let out = echo.embed_batch(&["a", "bb", "ccc"]).await.unwrap();
        assert_eq!(out, vec![vec![1.0], vec![2.0], vec![3.0]]);
    }
}
