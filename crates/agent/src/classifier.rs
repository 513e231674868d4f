//! Classifier (Supervisor) agent — §4.1.
//!
//! Decides the top-level routing label and, for follow-up questions,
//! rewrites the question into a standalone form before anything downstream
//! touches it.

use std::sync::Arc;

use via_rag_core::{AgentLabel, Classification, ConversationTurn};
use via_rag_llm::{LlmBackend, Message};
use via_rag_rag::VectorStoreAdapter;

use crate::context::{build_context_window, is_followup_candidate, RewriteCache};

const EMPTY_REWRITE_SENTINEL: &str = "[cần làm rõ]";

const NEGATIVE_AFFECT: &[&str] = &[
    "tệ", "thất vọng", "khó chịu", "bực mình", "không hài lòng", "kém",
];
const SYSTEM_FAILURE: &[&str] = &[
    "lỗi", "không vào được", "bị lỗi", "sập", "treo", "không truy cập được",
];
const INTERROGATIVE_MARKERS: &[&str] = &[
    "là gì", "như thế nào", "bao nhiêu", "ở đâu", "khi nào", "tại sao", "ai", "làm sao",
];

pub struct ClassifierConfig {
    pub rewrite_cache_size: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rewrite_cache_size: 10,
        }
    }
}

pub struct Classifier {
    llm: Arc<dyn LlmBackend>,
    vector_store: Arc<VectorStoreAdapter>,
    rewrite_cache: RewriteCache,
}

impl Classifier {
    pub fn new(
        llm: Arc<dyn LlmBackend>,
        vector_store: Arc<VectorStoreAdapter>,
        config: ClassifierConfig,
    ) -> Self {
        Self {
            llm,
            vector_store,
            rewrite_cache: RewriteCache::new(config.rewrite_cache_size),
        }
    }

    pub async fn classify(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> (Classification, bool) {
        let vector_store_live = self.vector_store.is_live().await;
        if !vector_store_live {
            return (
                Classification {
                    label: AgentLabel::Reporter,
                    contextualized_question: question.to_string(),
                    is_followup: false,
                    context_summary: String::new(),
                },
                vector_store_live,
            );
        }

        let (contextualized_question, is_followup) = if is_followup_candidate(question, history) {
            self.rewrite_question(question, history).await
        } else {
            (question.to_string(), false)
        };

        let classification = self
            .classify_label(question, &contextualized_question, history, is_followup)
            .await;

        (classification, vector_store_live)
    }

    async fn rewrite_question(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> (String, bool) {
        let context_window = build_context_window(history);
        let key = RewriteCache::key(&context_window, question);

        if let Some(cached) = self.rewrite_cache.get(&key) {
            return (cached, true);
        }

        let prompt = format!(
            "Dựa vào ngữ cảnh hội thoại sau, viết lại câu hỏi thành một câu hỏi độc lập, \
             không dùng đại từ thay thế. Nếu không thể viết lại, trả lời đúng \"{EMPTY_REWRITE_SENTINEL}\".\n\
             Ngữ cảnh: {context_window}\n\
             Câu hỏi: {question}\n\
             Câu hỏi độc lập:"
        );

        let messages = vec![Message::user(prompt)];

        let rewrite = match self.llm.generate(&messages).await {
            Ok(result) => result.text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "question rewrite failed, falling back to original");
                return (question.to_string(), false);
            }
        };

        if rewrite.is_empty() || rewrite == EMPTY_REWRITE_SENTINEL {
            return (question.to_string(), false);
        }

        self.rewrite_cache.put(key, rewrite.clone());
        (rewrite, true)
    }

    async fn classify_label(
        &self,
        original_question: &str,
        contextualized_question: &str,
        history: &[ConversationTurn],
        is_followup: bool,
    ) -> Classification {
        let history_excerpt = build_context_window(history);
        let prompt = format!(
            "Phân loại câu hỏi sau vào một trong các nhãn: FAQ, CHATTER, REPORTER, OTHER.\n\
             FAQ: câu hỏi về sản phẩm/dịch vụ có thể tra cứu.\n\
             CHATTER: phàn nàn, cảm xúc tiêu cực, trò chuyện xã giao.\n\
             REPORTER: báo cáo lỗi hệ thống, sự cố kỹ thuật.\n\
             OTHER: ngoài phạm vi trên.\n\
             Ngữ cảnh: {history_excerpt}\n\
             Câu hỏi: {contextualized_question}\n\
             Trả lời bằng JSON: {{\"label\": \"...\", \"context_summary\": \"...\"}}"
        );

        let messages = vec![Message::user(prompt)];

        let response = match self.llm.generate(&messages).await {
            Ok(result) => result.text,
            Err(e) => {
                tracing::warn!(error = %e, "classification call failed, using keyword fallback");
                return self.keyword_fallback(original_question, contextualized_question, is_followup);
            }
        };

        match parse_classification(&response) {
            Some((label, context_summary)) => Classification {
                label,
                contextualized_question: contextualized_question.to_string(),
                is_followup,
                context_summary,
            },
            None => self.keyword_fallback(original_question, contextualized_question, is_followup),
        }
    }

    fn keyword_fallback(
        &self,
        original_question: &str,
        contextualized_question: &str,
        is_followup: bool,
    ) -> Classification {
        let lower = original_question.to_lowercase();
        let label = if NEGATIVE_AFFECT.iter().any(|w| lower.contains(w)) {
            AgentLabel::Chatter
        } else if SYSTEM_FAILURE.iter().any(|w| lower.contains(w)) {
            AgentLabel::Reporter
        } else if INTERROGATIVE_MARKERS.iter().any(|w| lower.contains(w)) || lower.trim_end().ends_with('?') {
            AgentLabel::Faq
        } else {
            AgentLabel::Faq
        };

        Classification {
            label,
            contextualized_question: contextualized_question.to_string(),
            is_followup,
            context_summary: String::new(),
        }
    }
}

#[derive(serde::Deserialize)]
struct ClassificationJson {
    label: String,
    #[serde(default)]
    context_summary: String,
}

fn parse_classification(response: &str) -> Option<(AgentLabel, String)> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end <= start {
        return None;
    }
    let json_slice = &response[start..=end];
    let parsed: ClassificationJson = serde_json::from_str(json_slice).ok()?;
    Some((AgentLabel::parse_or_faq(&parsed.label), parsed.context_summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_classification_json() {
        let response = r#"Đây là kết quả: {"label": "CHATTER", "context_summary": "khách phàn nàn"}"#;
        let (label, summary) = parse_classification(response).unwrap();
        assert_eq!(label, AgentLabel::Chatter);
        assert_eq!(summary, "khách phàn nàn");
    }

    #[test]
    fn malformed_response_yields_none() {
        assert!(parse_classification("không có json ở đây").is_none());
    }

    #[test]
    fn unknown_label_in_json_falls_back_to_faq() {
        let response = r#"{"label": "UNKNOWN_LABEL", "context_summary": ""}"#;
        let (label, _) = parse_classification(response).unwrap();
        assert_eq!(label, AgentLabel::Faq);
    }
}
