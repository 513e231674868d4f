//! Grader — §4.4.
//!
//! Reranks retrieved documents and filters by dual thresholds. Reranker
//! failure is fatal and propagates (§7): no silent similarity-only fallback.

use std::sync::Arc;

use via_rag_core::{RankedCandidate, SearchCandidate};
use via_rag_rag::{RagError, RerankPair, RerankerClient};

const PASSAGE_TRUNC: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct GraderConfig {
    pub rerank_threshold: f32,
    pub similarity_threshold: f32,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            rerank_threshold: 0.6,
            similarity_threshold: 0.2,
        }
    }
}

pub struct Grader {
    reranker: Arc<dyn RerankerClient>,
    config: GraderConfig,
}

impl Grader {
    pub fn new(reranker: Arc<dyn RerankerClient>, config: GraderConfig) -> Self {
        Self { reranker, config }
    }

    pub async fn grade(
        &self,
        question: &str,
        documents: &[SearchCandidate],
    ) -> Result<Vec<RankedCandidate>, RagError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let pairs: Vec<RerankPair> = documents
            .iter()
            .map(|d| RerankPair::new(question, truncate_chars(&d.payload_text, PASSAGE_TRUNC)))
            .collect();

        let scores = self.reranker.score(&pairs).await?;

        let qualified = documents
            .iter()
            .zip(scores)
            .filter(|(doc, rerank_score)| {
                *rerank_score >= self.config.rerank_threshold
                    && doc.similarity_score >= self.config.similarity_threshold
            })
            .map(|(doc, rerank_score)| RankedCandidate {
                candidate: doc.clone(),
                rerank_score,
                variant_breakdown: None,
            })
            .collect();

        Ok(qualified)
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use via_rag_rag::RagError as RerankError;
    use async_trait::async_trait;

    struct FixedScorer(Vec<f32>);

    #[async_trait]
    impl RerankerClient for FixedScorer {
        async fn score(&self, pairs: &[RerankPair]) -> Result<Vec<f32>, RerankError> {
            Ok(self.0.iter().take(pairs.len()).copied().collect())
        }
    }

    fn candidate(id: &str, similarity: f32) -> SearchCandidate {
        SearchCandidate {
            id: id.to_string(),
            payload_text: "nội dung tài liệu".to_string(),
            similarity_score: similarity,
        }
    }

    #[tokio::test]
    async fn keeps_only_candidates_passing_both_thresholds() {
        let grader = Grader::new(Arc::new(FixedScorer(vec![0.8, 0.3])), GraderConfig::default());
        let docs = vec![candidate("a", 0.5), candidate("b", 0.5)];
        let qualified = grader.grade("câu hỏi", &docs).await.unwrap();
        assert_eq!(qualified.len(), 1);
        assert_eq!(qualified[0].candidate.id, "a");
    }

    #[tokio::test]
    async fn empty_documents_short_circuit_to_empty() {
        let grader = Grader::new(Arc::new(FixedScorer(vec![])), GraderConfig::default());
        let qualified = grader.grade("câu hỏi", &[]).await.unwrap();
        assert!(qualified.is_empty());
    }
}
