//! Cross-encoder reranker client
//!
//! Modeled as an opaque remote scoring service (§4.8): the workflow only
//! knows the request/response contract — a batch of (query, passage) pairs in,
//! one real score per pair out, in the same order. Batches are capped to
//! `batch_size` and sent sequentially; a single pair never exceeds
//! `max_input_len` characters (the spec's proxy for the model's token budget).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::RagError;

#[derive(Debug, Clone)]
pub struct RerankerConfig {
    pub endpoint: String,
    pub model: String,
    pub max_input_len: usize,
    pub batch_size: usize,
    /// When true, a reranker that fails to load/respond is a startup-time
    /// fatal error rather than a per-request one.
    pub fail_fast: bool,
    pub timeout: Duration,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8008/rerank".to_string(),
            model: "cross-encoder/ms-marco-MiniLM-L-12-v2".to_string(),
            max_input_len: 512,
            batch_size: 32,
            fail_fast: false,
            timeout: Duration::from_secs(10),
        }
    }
}

/// One (query, passage) pair submitted for scoring.
#[derive(Debug, Clone)]
pub struct RerankPair {
    pub query: String,
    pub passage: String,
}

impl RerankPair {
    pub fn new(query: impl Into<String>, passage: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            passage: passage.into(),
        }
    }
}

/// A cross-encoder scorer. Reranker failure is fatal for the Grader and FAQ
/// Responder (§4.2/§4.4/§7) — callers propagate `Err` rather than falling
/// back to similarity-only ranking.
#[async_trait]
pub trait RerankerClient: Send + Sync {
    async fn score(&self, pairs: &[RerankPair]) -> Result<Vec<f32>, RagError>;
}

/// HTTP-backed cross-encoder client.
pub struct HttpReranker {
    client: Client,
    config: RerankerConfig,
}

impl HttpReranker {
    pub fn new(config: RerankerConfig) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn truncate<'a>(&self, text: &'a str) -> &'a str {
        let max = self.config.max_input_len;
        match text.char_indices().nth(max) {
            Some((byte_idx, _)) => &text[..byte_idx],
            None => text,
        }
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    pairs: Vec<(&'a str, &'a str)>,
}

#[derive(Deserialize)]
struct RerankResponse {
    scores: Vec<f32>,
}

#[async_trait]
impl RerankerClient for HttpReranker {
    async fn score(&self, pairs: &[RerankPair]) -> Result<Vec<f32>, RagError> {
        let mut scores = Vec::with_capacity(pairs.len());

        for chunk in pairs.chunks(self.config.batch_size) {
            let request = RerankRequest {
                model: &self.config.model,
                pairs: chunk
                    .iter()
                    .map(|p| (self.truncate(&p.query), self.truncate(&p.passage)))
                    .collect(),
            };

            let response = self
                .client
                .post(&self.config.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|e| RagError::Reranker(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(RagError::Reranker(format!("HTTP {status}: {body}")));
            }

            let parsed: RerankResponse = response
                .json()
                .await
                .map_err(|e| RagError::Reranker(e.to_string()))?;

            if parsed.scores.len() != chunk.len() {
                return Err(RagError::Reranker(format!(
                    "expected {} scores, got {}",
                    chunk.len(),
                    parsed.scores.len()
                )));
            }

            scores.extend(parsed.scores);
        }

        Ok(scores)
    }
}

/// Deterministic TF-IDF-like scorer used only for local development and tests
/// when no real cross-encoder service is configured — never a silent
/// production fallback (the Grader and FAQ Responder never reach for this on
/// their own; it must be wired in explicitly).
pub struct SimpleScorer;

impl SimpleScorer {
    const STOPWORDS: &'static [&'static str] = &[
        "là", "của", "và", "các", "có", "được", "cho", "với", "những", "một", "này", "đó", "khi",
        "như", "để", "từ", "tôi", "bạn",
    ];

    pub fn score(query: &str, passage: &str) -> f32 {
        let query_lower = query.to_lowercase();
        let passage_lower = passage.to_lowercase();

        let stopwords: std::collections::HashSet<&str> = Self::STOPWORDS.iter().copied().collect();

        let query_terms: Vec<&str> = query_lower
            .split_whitespace()
            .filter(|w| w.chars().count() > 1 && !stopwords.contains(*w))
            .collect();

        if query_terms.is_empty() {
            return 0.0;
        }

        let passage_words: Vec<&str> = passage_lower.split_whitespace().collect();
        let passage_len = passage_words.len().max(1) as f32;

        let mut total_score = 0.0f32;
        let mut matched_terms = 0usize;

        for (pos, term) in query_terms.iter().enumerate() {
            let tf = passage_words.iter().filter(|w| **w == *term).count() as f32;
            if tf > 0.0 {
                matched_terms += 1;
                let tf_score = tf.sqrt();
                let idf_approx = (1.0 + term.chars().count() as f32).ln();
                let position_weight = 1.0 / (1.0 + pos as f32 * 0.1);
                let length_norm = 1.0 / (1.0 + (passage_len / 50.0).sqrt());
                total_score += tf_score * idf_approx * position_weight * length_norm;
            }
        }

        let coverage = matched_terms as f32 / query_terms.len() as f32;
        let raw_score = total_score + coverage * 0.3;
        (raw_score / (raw_score + 1.0)).min(1.0)
    }
}

#[async_trait]
impl RerankerClient for SimpleScorer {
    async fn score(&self, pairs: &[RerankPair]) -> Result<Vec<f32>, RagError> {
        Ok(pairs
            .iter()
            .map(|p| Self::score(&p.query, &p.passage))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simple_scorer_favors_matching_passage() {
        let scorer = SimpleScorer;
        let pairs = vec![
            RerankPair::new("lãi suất vay thế chấp", "Lãi suất vay thế chấp hiện nay là 8%"),
            RerankPair::new("lãi suất vay thế chấp", "Hôm nay trời đẹp"),
        ];
        let scores = scorer.score(&pairs).await.unwrap();
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn truncate_respects_char_boundary() {
        let config = RerankerConfig {
            max_input_len: 3,
            ..RerankerConfig::default()
        };
        let reranker = HttpReranker {
            client: Client::new(),
            config,
        };
        assert_eq!(reranker.truncate("điều"), "điề");
    }
}
