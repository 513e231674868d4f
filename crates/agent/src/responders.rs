//! Terminal responders — §4.6: Not-Enough-Info, Chatter, Reporter, Other.
//!
//! Each owns a fixed prompt template with one substitution, calls the LLM,
//! and falls back to a hard-coded string when the reply is empty or too
//! short. Streaming is simulated by whitespace-splitting the buffered
//! answer and sending it word-by-word, per §9's "single-shot sequence"
//! design note.

use std::sync::Arc;

use tokio::sync::mpsc;

use via_rag_core::{Answer, AnswerStatus, Reference, ReferenceKind};
use via_rag_llm::{LlmBackend, Message};

const MIN_REPLY_LEN: usize = 10;

async fn run_fixed_prompt(
    llm: &Arc<dyn LlmBackend>,
    prompt: String,
    fallback: &str,
    reference: Option<Reference>,
    tx: mpsc::Sender<String>,
) -> Answer {
    let messages = vec![Message::user(prompt)];

    let text = match llm.generate(&messages).await {
        Ok(result) if result.text.chars().count() >= MIN_REPLY_LEN => result.text,
        Ok(_) => fallback.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "responder LLM call failed, using fallback");
            fallback.to_string()
        }
    };

    for word in text.split_whitespace() {
        if tx.send(format!("{word} ")).await.is_err() {
            break;
        }
    }

    Answer {
        text,
        status: AnswerStatus::Success,
        references: reference.into_iter().collect(),
    }
}

pub struct NotEnoughInfoResponder {
    llm: Arc<dyn LlmBackend>,
}

impl NotEnoughInfoResponder {
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self { llm }
    }

    pub async fn respond(&self, question: &str, tx: mpsc::Sender<String>) -> Answer {
        let prompt = format!(
            "Khách hàng hỏi: \"{question}\". Chúng tôi không tìm thấy thông tin liên quan \
             trong tài liệu. Hãy trả lời lịch sự, thừa nhận không có đủ thông tin và đề nghị \
             khách hàng diễn đạt lại câu hỏi hoặc cung cấp thêm chi tiết."
        );
        let fallback = "Xin lỗi, tôi chưa tìm thấy thông tin phù hợp để trả lời câu hỏi này. \
             Bạn có thể diễn đạt lại hoặc cung cấp thêm chi tiết được không?";

        let mut answer = run_fixed_prompt(&self.llm, prompt, fallback, None, tx).await;
        answer.status = AnswerStatus::Insufficient;
        answer
    }
}

pub struct ChatterResponder {
    llm: Arc<dyn LlmBackend>,
    support_phone: String,
}

impl ChatterResponder {
    pub fn new(llm: Arc<dyn LlmBackend>, support_phone: String) -> Self {
        Self { llm, support_phone }
    }

    pub async fn respond(&self, question: &str, tx: mpsc::Sender<String>) -> Answer {
        let prompt = format!(
            "Khách hàng bày tỏ cảm xúc không hài lòng: \"{question}\". Hãy trả lời với thái độ \
             thấu cảm, xin lỗi vì trải nghiệm chưa tốt, và cung cấp số điện thoại hỗ trợ: \
             {}.",
            self.support_phone
        );
        let fallback = format!(
            "Chúng tôi rất xin lỗi vì trải nghiệm chưa tốt của bạn. Vui lòng liên hệ \
             {} để được hỗ trợ trực tiếp.",
            self.support_phone
        );

        run_fixed_prompt(&self.llm, prompt, &fallback, Some(Reference::new("support", ReferenceKind::Support)), tx).await
    }
}

pub struct ReporterResponder {
    llm: Arc<dyn LlmBackend>,
    support_phone: String,
}

impl ReporterResponder {
    pub fn new(llm: Arc<dyn LlmBackend>, support_phone: String) -> Self {
        Self { llm, support_phone }
    }

    /// Consults `vector_store_live` (§4.6): live → normal-operation framing,
    /// down → a short maintenance notice.
    pub async fn respond(&self, question: &str, vector_store_live: bool, tx: mpsc::Sender<String>) -> Answer {
        if !vector_store_live {
            let fallback = format!(
                "Hệ thống đang trong quá trình bảo trì, một số chức năng có thể tạm thời gián đoạn. \
                 Vui lòng liên hệ {} nếu cần hỗ trợ gấp.",
                self.support_phone
            );
            for word in fallback.split_whitespace() {
                if tx.send(format!("{word} ")).await.is_err() {
                    break;
                }
            }
            return Answer {
                text: fallback,
                status: AnswerStatus::Success,
                references: vec![Reference::new("system_status", ReferenceKind::System)],
            };
        }

        let prompt = format!(
            "Khách hàng báo cáo sự cố hệ thống: \"{question}\". Hệ thống đang hoạt động bình \
             thường. Hãy trả lời, xác nhận hệ thống hoạt động bình thường, xin lỗi vì bất tiện, \
             và cung cấp số điện thoại hỗ trợ: {}.",
            self.support_phone
        );
        let fallback = format!(
            "Cảm ơn bạn đã phản ánh. Hệ thống hiện đang hoạt động bình thường. Nếu vấn đề vẫn \
             tiếp diễn, vui lòng liên hệ {} để được hỗ trợ.",
            self.support_phone
        );

        run_fixed_prompt(&self.llm, prompt, &fallback, Some(Reference::new("system_status", ReferenceKind::System)), tx).await
    }
}

pub struct OtherResponder {
    llm: Arc<dyn LlmBackend>,
}

impl OtherResponder {
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self { llm }
    }

    pub async fn respond(&self, question: &str, tx: mpsc::Sender<String>) -> Answer {
        let prompt = format!(
            "Khách hàng hỏi một câu hỏi ngoài phạm vi dịch vụ: \"{question}\". Hãy trả lời lịch \
             sự, giải thích ngắn gọn rằng câu hỏi nằm ngoài phạm vi hỗ trợ, có thể trả lời bằng \
             kiến thức chung nếu phù hợp, không bịa đặt thông tin về sản phẩm/dịch vụ."
        );
        let fallback = "Xin lỗi, câu hỏi này nằm ngoài phạm vi hỗ trợ của tôi. Bạn có thể hỏi về \
             sản phẩm hoặc dịch vụ của chúng tôi để tôi hỗ trợ tốt hơn.";

        run_fixed_prompt(
            &self.llm,
            prompt,
            fallback,
            Some(Reference::new("general_knowledge", ReferenceKind::GeneralKnowledge)),
            tx,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyBackend;

    #[async_trait::async_trait]
    impl LlmBackend for EmptyBackend {
        async fn generate(&self, _messages: &[Message]) -> Result<via_rag_llm::GenerationResult, via_rag_llm::LlmError> {
            Ok(via_rag_llm::GenerationResult {
                text: String::new(),
                tokens: 0,
                time_to_first_token_ms: 0,
                total_time_ms: 0,
                tokens_per_second: 0.0,
                finish_reason: via_rag_llm::FinishReason::Stop,
                context: None,
            })
        }
        async fn generate_stream(
            &self,
            _messages: &[Message],
            _tx: mpsc::Sender<String>,
        ) -> Result<via_rag_llm::GenerationResult, via_rag_llm::LlmError> {
            unimplemented!()
        }
        async fn is_available(&self) -> bool {
            true
        }
        fn model_name(&self) -> &str {
            "empty"
        }
    }

    #[tokio::test]
    async fn chatter_uses_fallback_when_llm_reply_too_short() {
        let responder = ChatterResponder::new(Arc::new(EmptyBackend), "0900000000".to_string());
        let (tx, _rx) = mpsc::channel(16);
        let answer = responder.respond("dịch vụ tệ quá", tx).await;
        assert!(answer.text.contains("0900000000"));
    }

    #[tokio::test]
    async fn reporter_frames_maintenance_notice_when_store_down() {
        let responder = ReporterResponder::new(Arc::new(EmptyBackend), "0900000000".to_string());
        let (tx, _rx) = mpsc::channel(16);
        let answer = responder.respond("hệ thống lỗi", false, tx).await;
        assert!(answer.text.contains("bảo trì"));
        assert_eq!(answer.references[0].document_id, "system_status");
    }

    #[tokio::test]
    async fn not_enough_info_status_is_insufficient() {
        let responder = NotEnoughInfoResponder::new(Arc::new(EmptyBackend));
        let (tx, _rx) = mpsc::channel(16);
        let answer = responder.respond("câu hỏi lạ", tx).await;
        assert_eq!(answer.status, AnswerStatus::Insufficient);
    }
}
