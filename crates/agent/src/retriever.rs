//! Document Retriever — §4.3.

use std::sync::Arc;

use via_rag_core::SearchCandidate;
use via_rag_rag::{EmbeddingClient, RagError, VectorStoreAdapter};

#[derive(Debug, Clone, Copy)]
pub struct RetrieverConfig {
    pub top_k: usize,
    pub similarity_threshold: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 15,
            similarity_threshold: 0.2,
        }
    }
}

pub struct RetrieverResult {
    pub documents: Vec<SearchCandidate>,
}

pub struct DocumentRetriever {
    vector_store: Arc<VectorStoreAdapter>,
    embedder: Arc<dyn EmbeddingClient>,
    config: RetrieverConfig,
}

impl DocumentRetriever {
    pub fn new(
        vector_store: Arc<VectorStoreAdapter>,
        embedder: Arc<dyn EmbeddingClient>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            vector_store,
            embedder,
            config,
        }
    }

    /// Search failure routes to Not-Enough-Info, i.e. returns an empty
    /// result rather than propagating (§4.3).
    pub async fn retrieve(&self, question: &str) -> Result<RetrieverResult, RagError> {
        let embedding = match self.embedder.embed(question).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "document embedding failed");
                return Ok(RetrieverResult { documents: Vec::new() });
            }
        };

        let candidates = match self
            .vector_store
            .search_documents(&embedding, self.config.top_k)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "document vector search failed");
                return Ok(RetrieverResult { documents: Vec::new() });
            }
        };

        let above_floor: Vec<_> = candidates
            .iter()
            .filter(|c| c.similarity_score >= self.config.similarity_threshold)
            .cloned()
            .collect();

        if above_floor.is_empty() {
            Ok(RetrieverResult { documents: candidates })
        } else {
            Ok(RetrieverResult { documents: above_floor })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = RetrieverConfig::default();
        assert_eq!(config.top_k, 15);
        assert_eq!(config.similarity_threshold, 0.2);
    }
}
