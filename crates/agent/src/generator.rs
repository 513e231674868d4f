//! Generator — §4.5.
//!
//! Formats the final answer prompt from question, graded passages, history
//! and (for follow-ups) a context summary, then streams LLM tokens to the
//! caller. Whether those tokens are forwarded as SSE or joined into one
//! string for the non-streaming endpoint is a decision made by the caller,
//! not here (§9 open question) — the Generator always streams into the
//! channel it is given.

use std::sync::Arc;

use tokio::sync::mpsc;

use via_rag_core::{dedupe_references, Answer, AnswerStatus, ConversationTurn, RankedCandidate, Reference, ReferenceKind};
use via_rag_llm::{LlmBackend, LlmError, Message};

use crate::context::{build_context_window, extract_context_summary};

const TOP_PASSAGES: usize = 5;
const PASSAGE_PREVIEW_TRUNC: usize = 500;
const EMPTY_PASSAGES_APOLOGY: &str =
    "Xin lỗi, hiện tại tôi không tìm thấy thông tin phù hợp để trả lời câu hỏi này.";

pub struct GeneratorInput<'a> {
    pub question: &'a str,
    pub history: &'a [ConversationTurn],
    pub is_followup: bool,
    pub passages: &'a [RankedCandidate],
}

pub struct Generator {
    llm: Arc<dyn LlmBackend>,
}

impl Generator {
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self { llm }
    }

    pub async fn generate(
        &self,
        input: GeneratorInput<'_>,
        tx: mpsc::Sender<String>,
    ) -> Result<Answer, LlmError> {
        if input.passages.is_empty() {
            let _ = tx.send(EMPTY_PASSAGES_APOLOGY.to_string()).await;
            return Ok(Answer::error(EMPTY_PASSAGES_APOLOGY));
        }

        let prompt = self.build_prompt(&input);
        let messages = vec![Message::user(prompt)];

        let result = self.llm.generate_stream(&messages, tx).await?;

        let references = dedupe_references(
            input
                .passages
                .iter()
                .take(TOP_PASSAGES)
                .map(|p| {
                    let mut r = Reference::new(p.candidate.id.clone(), ReferenceKind::Document);
                    r.description = Some(truncate_chars(&p.candidate.payload_text, PASSAGE_PREVIEW_TRUNC).to_string());
                    r.similarity_score = Some(p.candidate.similarity_score);
                    r.rerank_score = Some(p.rerank_score);
                    r
                })
                .collect(),
        );

        Ok(Answer {
            text: result.text,
            status: AnswerStatus::Success,
            references,
        })
    }

    fn build_prompt(&self, input: &GeneratorInput<'_>) -> String {
        let history_excerpt = build_context_window(input.history);

        let documents_block: String = input
            .passages
            .iter()
            .take(TOP_PASSAGES)
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "[Tài liệu {}] (Độ liên quan: {:.2})\n{}",
                    i + 1,
                    p.rerank_score,
                    truncate_chars(&p.candidate.payload_text, PASSAGE_PREVIEW_TRUNC)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        if input.is_followup {
            let context_summary = extract_context_summary(input.history);
            format!(
                "Bạn là trợ lý trả lời câu hỏi dựa trên tài liệu được cung cấp.\n\
                 {context_summary}\n\
                 Đây là câu hỏi tiếp theo trong cuộc trò chuyện. Hãy tham chiếu đến nội dung đã trao đổi \
                 nhưng không lặp lại nguyên văn câu trả lời trước.\n\
                 Lịch sử gần đây: {history_excerpt}\n\n\
                 Tài liệu tham khảo:\n{documents_block}\n\n\
                 Câu hỏi: {}\n\
                 Trả lời:",
                input.question
            )
        } else {
            format!(
                "Bạn là trợ lý trả lời câu hỏi dựa trên tài liệu được cung cấp.\n\
                 Lịch sử gần đây: {history_excerpt}\n\n\
                 Tài liệu tham khảo:\n{documents_block}\n\n\
                 Câu hỏi: {}\n\
                 Trả lời:",
                input.question
            )
        }
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
    use via_rag_core::SearchCandidate;

    #[tokio::test]
    async fn empty_passages_produce_error_answer_without_calling_llm() {
        struct PanicBackend;

        #[async_trait::async_trait]
        impl LlmBackend for PanicBackend {
            async fn generate(&self, _messages: &[Message]) -> Result<via_rag_llm::GenerationResult, LlmError> {
                panic!("must not be called")
            }
            async fn generate_stream(
                &self,
                _messages: &[Message],
                _tx: mpsc::Sender<String>,
            ) -> Result<via_rag_llm::GenerationResult, LlmError> {
                panic!("must not be called")
            }
            async fn is_available(&self) -> bool {
                true
            }
            fn model_name(&self) -> &str {
                "panic"
            }
        }

        let generator = Generator::new(Arc::new(PanicBackend));
        let (tx, mut rx) = mpsc::channel(4);
        let input = GeneratorInput {
            question: "câu hỏi",
            history: &[],
            is_followup: false,
            passages: &[],
        };

        let answer = generator.generate(input, tx).await.unwrap();
        assert_eq!(answer.status, AnswerStatus::Error);
        assert_eq!(rx.recv().await.unwrap(), EMPTY_PASSAGES_APOLOGY);
    }

    #[test]
    fn prompt_includes_top_five_passages_only() {
        let llm_stub: Arc<dyn LlmBackend> = Arc::new(NoopBackend);
        let generator = Generator::new(llm_stub);

        let passages: Vec<RankedCandidate> = (0..8)
            .map(|i| RankedCandidate {
                candidate: SearchCandidate {
                    id: format!("doc-{i}"),
                    payload_text: format!("nội dung {i}"),
                    similarity_score: 0.5,
                },
                rerank_score: 0.7,
                variant_breakdown: None,
            })
            .collect();

        let input = GeneratorInput {
            question: "câu hỏi",
            history: &[],
            is_followup: false,
            passages: &passages,
        };

        let prompt = generator.build_prompt(&input);
        assert!(prompt.contains("Tài liệu 5"));
        assert!(!prompt.contains("Tài liệu 6"));
    }

    struct NoopBackend;

    #[async_trait::async_trait]
    impl LlmBackend for NoopBackend {
        async fn generate(&self, _messages: &[Message]) -> Result<via_rag_llm::GenerationResult, LlmError> {
            unimplemented!()
        }
        async fn generate_stream(
            &self,
            _messages: &[Message],
            _tx: mpsc::Sender<String>,
        ) -> Result<via_rag_llm::GenerationResult, LlmError> {
            unimplemented!()
        }
        async fn is_available(&self) -> bool {
            true
        }
        fn model_name(&self) -> &str {
            "noop"
        }
    }
}
