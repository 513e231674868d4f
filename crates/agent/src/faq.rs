//! FAQ Responder — §4.2.
//!
//! Answers when a single FAQ entry covers the question directly; otherwise
//! defers to the Document Retriever / Grader path.

use std::sync::Arc;

use via_rag_core::{AnswerStatus, Reference, ReferenceKind};
use via_rag_llm::{LlmBackend, Message};
use via_rag_rag::{
    fuse_faq_scores, EmbeddingClient, FaqVariantScores, FusionWeights, RagError, RerankPair,
    RerankerClient, VectorStoreAdapter,
};

const NOT_FOUND_SENTINEL: &str = "NOT_FOUND";
const MIN_SYNTHESIZED_ANSWER_LEN: usize = 10;
const QUESTION_ANSWER_TRUNC: usize = 500;
const ANSWER_TRUNC: usize = 400;
const TOP_FAQS_FOR_SYNTHESIS: usize = 3;

#[derive(Debug, Clone)]
pub struct FaqConfig {
    pub top_k: usize,
    pub vector_threshold: f32,
    pub rerank_threshold: f32,
    pub rerank_direct_threshold: f32,
    pub similarity_force_threshold: f32,
    pub weights: FusionWeights,
    pub consistency_threshold: f32,
    pub consistency_bonus: f32,
}

impl Default for FaqConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            vector_threshold: 0.5,
            rerank_threshold: 0.6,
            rerank_direct_threshold: 0.75,
            similarity_force_threshold: 0.85,
            weights: FusionWeights::default(),
            consistency_threshold: 0.6,
            consistency_bonus: 1.1,
        }
    }
}

pub struct FaqResult {
    pub status: AnswerStatus,
    pub answer: String,
    pub references: Vec<Reference>,
}

impl FaqResult {
    fn defer() -> Self {
        Self {
            status: AnswerStatus::NotFound,
            answer: String::new(),
            references: Vec::new(),
        }
    }

    /// Fallback used when the branch itself times out (§5).
    pub fn timeout_fallback() -> Self {
        Self::defer()
    }
}

struct ScoredFaq {
    id: String,
    question: String,
    answer: String,
    similarity_score: f32,
    final_score: f32,
}

pub struct FaqResponder {
    vector_store: Arc<VectorStoreAdapter>,
    embedder: Arc<dyn EmbeddingClient>,
    reranker: Arc<dyn RerankerClient>,
    llm: Arc<dyn LlmBackend>,
    config: FaqConfig,
}

impl FaqResponder {
    pub fn new(
        vector_store: Arc<VectorStoreAdapter>,
        embedder: Arc<dyn EmbeddingClient>,
        reranker: Arc<dyn RerankerClient>,
        llm: Arc<dyn LlmBackend>,
        config: FaqConfig,
    ) -> Self {
        Self {
            vector_store,
            embedder,
            reranker,
            llm,
            config,
        }
    }

    /// Reranker failure is fatal and propagates (§4.2, §7); vector-search
    /// failure is not — it defers to the next stage.
    pub async fn answer(&self, question: &str) -> Result<FaqResult, RagError> {
        let embedding = match self.embedder.embed(question).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "FAQ embedding failed, deferring");
                return Ok(FaqResult::defer());
            }
        };

        let candidates = match self.vector_store.search_faq(&embedding, self.config.top_k).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "FAQ vector search failed, deferring");
                return Ok(FaqResult::defer());
            }
        };

        let survivors: Vec<_> = candidates
            .into_iter()
            .filter(|c| c.similarity_score >= self.config.vector_threshold)
            .collect();

        if survivors.is_empty() {
            return Ok(FaqResult::defer());
        }

        let mut pairs = Vec::with_capacity(survivors.len() * 3);
        for c in &survivors {
            pairs.push(RerankPair::new(question, &c.question));
            pairs.push(RerankPair::new(
                question,
                format!("{} {}", c.question, truncate_chars(&c.answer, QUESTION_ANSWER_TRUNC)),
            ));
            pairs.push(RerankPair::new(question, truncate_chars(&c.answer, ANSWER_TRUNC)));
        }

        let scores = self.reranker.score(&pairs).await?;

        let mut scored: Vec<ScoredFaq> = survivors
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let variant = FaqVariantScores {
                    question_score: scores[i * 3],
                    question_answer_score: scores[i * 3 + 1],
                    answer_score: scores[i * 3 + 2],
                };
                let final_score = fuse_faq_scores(
                    variant,
                    self.config.weights,
                    self.config.consistency_threshold,
                    self.config.consistency_bonus,
                );
                ScoredFaq {
                    id: c.id,
                    question: c.question,
                    answer: c.answer,
                    similarity_score: c.similarity_score,
                    final_score,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap());

        let top = &scored[0];

        if top.similarity_score >= self.config.similarity_force_threshold
            || top.final_score >= self.config.rerank_direct_threshold
        {
            return Ok(self.direct_answer(top));
        }

        if top.final_score >= self.config.rerank_threshold {
            return self.synthesize(question, &scored).await;
        }

        Ok(FaqResult::defer())
    }

    fn direct_answer(&self, top: &ScoredFaq) -> FaqResult {
        let mut reference = Reference::new(top.id.clone(), ReferenceKind::Faq);
        reference.description = Some(top.question.clone());
        reference.similarity_score = Some(top.similarity_score);
        reference.rerank_score = Some(top.final_score);

        FaqResult {
            status: AnswerStatus::Success,
            answer: top.answer.clone(),
            references: vec![reference],
        }
    }

    async fn synthesize(&self, question: &str, scored: &[ScoredFaq]) -> Result<FaqResult, RagError> {
        let top_faqs = &scored[..scored.len().min(TOP_FAQS_FOR_SYNTHESIS)];

        let faq_block: String = top_faqs
            .iter()
            .enumerate()
            .map(|(i, f)| format!("[FAQ {}] Hỏi: {}\nĐáp: {}", i + 1, f.question, f.answer))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "Dựa vào các câu hỏi thường gặp sau, trả lời câu hỏi của khách hàng. \
             Nếu không câu nào phù hợp, trả lời đúng \"{NOT_FOUND_SENTINEL}\".\n\n\
             {faq_block}\n\n\
             Câu hỏi: {question}\n\
             Trả lời:"
        );

        let messages = vec![Message::user(prompt)];

        let response = match self.llm.generate(&messages).await {
            Ok(r) => r.text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "FAQ synthesis call failed, deferring");
                return Ok(FaqResult::defer());
            }
        };

        if response == NOT_FOUND_SENTINEL || response.chars().count() < MIN_SYNTHESIZED_ANSWER_LEN {
            return Ok(FaqResult::defer());
        }

        let references = top_faqs
            .iter()
            .map(|f| {
                let mut r = Reference::new(f.id.clone(), ReferenceKind::Faq);
                r.description = Some(f.question.clone());
                r.similarity_score = Some(f.similarity_score);
                r.rerank_score = Some(f.final_score);
                r
            })
            .collect();

        Ok(FaqResult {
            status: AnswerStatus::Success,
            answer: response,
            references,
        })
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

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("điều khoản", 4), "điều");
    }

    #[test]
    fn defer_result_has_not_found_status_and_no_references() {
        let result = FaqResult::defer();
        assert_eq!(result.status, AnswerStatus::NotFound);
        assert!(result.references.is_empty());
    }
}
