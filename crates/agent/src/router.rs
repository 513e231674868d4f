//! Decision Router — §4.7.
//!
//! A pure function: no I/O, no mutation, just priority-ordered branching
//! over the three fan-out results.

use via_rag_core::{AgentLabel, AnswerStatus, Classification, SearchCandidate};

use crate::faq::FaqResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Chatter,
    Reporter,
    Other,
    FaqAnswer,
    Grader,
    NotEnoughInfo,
}

/// Priority order (§4.7): special label first, then a confident FAQ answer,
/// then "do we have any documents at all", then the fallback.
pub fn decide(classification: &Classification, faq: &FaqResult, documents: &[SearchCandidate]) -> Route {
    match classification.label {
        AgentLabel::Chatter => return Route::Chatter,
        AgentLabel::Reporter => return Route::Reporter,
        AgentLabel::Other => return Route::Other,
        AgentLabel::Faq => {}
    }

    if faq.status == AnswerStatus::Success {
        return Route::FaqAnswer;
    }

    if !documents.is_empty() {
        return Route::Grader;
    }

    Route::NotEnoughInfo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faq_classification(label: AgentLabel) -> Classification {
        Classification {
            label,
            contextualized_question: "câu hỏi".to_string(),
            is_followup: false,
            context_summary: String::new(),
        }
    }

    fn candidate() -> SearchCandidate {
        SearchCandidate {
            id: "doc-1".to_string(),
            payload_text: "nội dung".to_string(),
            similarity_score: 0.5,
        }
    }

    #[test]
    fn special_label_wins_even_with_documents_present() {
        let classification = faq_classification(AgentLabel::Chatter);
        let faq = FaqResult {
            status: AnswerStatus::NotFound,
            answer: String::new(),
            references: Vec::new(),
        };
        let route = decide(&classification, &faq, &[candidate()]);
        assert_eq!(route, Route::Chatter);
    }

    #[test]
    fn successful_faq_answer_wins_over_documents() {
        let classification = faq_classification(AgentLabel::Faq);
        let faq = FaqResult {
            status: AnswerStatus::Success,
            answer: "câu trả lời".to_string(),
            references: Vec::new(),
        };
        let route = decide(&classification, &faq, &[candidate()]);
        assert_eq!(route, Route::FaqAnswer);
    }

    #[test]
    fn documents_present_routes_to_grader() {
        let classification = faq_classification(AgentLabel::Faq);
        let faq = FaqResult {
            status: AnswerStatus::NotFound,
            answer: String::new(),
            references: Vec::new(),
        };
        let route = decide(&classification, &faq, &[candidate()]);
        assert_eq!(route, Route::Grader);
    }

    #[test]
    fn no_documents_and_no_faq_routes_to_not_enough_info() {
        let classification = faq_classification(AgentLabel::Faq);
        let faq = FaqResult {
            status: AnswerStatus::NotFound,
            answer: String::new(),
            references: Vec::new(),
        };
        let route = decide(&classification, &faq, &[]);
        assert_eq!(route, Route::NotEnoughInfo);
    }
}
