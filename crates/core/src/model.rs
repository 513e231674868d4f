//! Request/response data model shared by the rag, llm, agent and server crates.

use serde::{Deserialize, Serialize};

/// Minimum and maximum accepted length (in UTF-8 chars) of an incoming question.
pub const QUESTION_MIN_LEN: usize = 3;
pub const QUESTION_MAX_LEN: usize = 1000;

/// Role of a single turn in caller-supplied conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One turn of caller-supplied history. The caller owns this; the service never
/// persists it across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

/// Top-level routing label produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentLabel {
    Faq,
    Chatter,
    Reporter,
    Other,
}

impl AgentLabel {
    /// Parse a label from a free-form LLM response, case-insensitively.
    /// Anything unrecognized converts to `Faq` (see classifier failure semantics).
    pub fn parse_or_faq(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "FAQ" => Self::Faq,
            "CHATTER" => Self::Chatter,
            "REPORTER" => Self::Reporter,
            "OTHER" => Self::Other,
            _ => Self::Faq,
        }
    }
}

impl std::fmt::Display for AgentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Faq => "FAQ",
            Self::Chatter => "CHATTER",
            Self::Reporter => "REPORTER",
            Self::Other => "OTHER",
        };
        write!(f, "{s}")
    }
}

/// Output of the Classifier (Supervisor) agent.
#[derive(Debug, Clone)]
pub struct Classification {
    pub label: AgentLabel,
    pub contextualized_question: String,
    pub is_followup: bool,
    pub context_summary: String,
}

impl Classification {
    /// The degraded-but-never-fatal classification used whenever the classifier
    /// itself cannot run to completion.
    pub fn fallback(original_question: &str) -> Self {
        Self {
            label: AgentLabel::Faq,
            contextualized_question: original_question.to_string(),
            is_followup: false,
            context_summary: String::new(),
        }
    }
}

/// A single vector-search hit, before reranking.
#[derive(Debug, Clone)]
pub struct SearchCandidate {
    pub id: String,
    pub payload_text: String,
    pub similarity_score: f32,
}

/// Per-variant cross-encoder scores kept for diagnostics on the FAQ path.
#[derive(Debug, Clone, Default)]
pub struct VariantBreakdown {
    pub question_score: f32,
    pub question_answer_score: f32,
    pub answer_score: f32,
}

/// A `SearchCandidate` that has been scored by the cross-encoder.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub candidate: SearchCandidate,
    pub rerank_score: f32,
    pub variant_breakdown: Option<VariantBreakdown>,
}

/// The kind of source a `Reference` points back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReferenceKind {
    Faq,
    Document,
    Support,
    System,
    GeneralKnowledge,
}

/// A citation returned alongside an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub document_id: String,
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl Reference {
    pub fn new(document_id: impl Into<String>, kind: ReferenceKind) -> Self {
        Self {
            document_id: document_id.into(),
            kind,
            description: None,
            similarity_score: None,
            rerank_score: None,
        }
    }
}

/// Deduplicate references by `document_id`, preserving first-seen order.
pub fn dedupe_references(references: Vec<Reference>) -> Vec<Reference> {
    let mut seen = std::collections::HashSet::new();
    references
        .into_iter()
        .filter(|r| seen.insert(r.document_id.clone()))
        .collect()
}

/// Terminal status of a request, also used as the intermediate `STREAMING`
/// marker on SSE `start`/`chunk` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnswerStatus {
    Success,
    Error,
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    Insufficient,
    Streaming,
}

/// A finished (or finishing) answer.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub status: AnswerStatus,
    pub references: Vec<Reference>,
}

impl Answer {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: AnswerStatus::Error,
            references: Vec::new(),
        }
    }
}

/// Mutable per-request state threaded through the workflow graph.
///
/// Owned exclusively by the handling request; never shared across requests.
#[derive(Debug, Clone)]
pub struct RequestState {
    pub original_question: String,
    pub question: String,
    pub history: Vec<ConversationTurn>,
    pub is_followup: bool,
    pub context_summary: String,
    pub vector_store_live: bool,
    pub documents: Vec<SearchCandidate>,
    pub qualified_documents: Vec<RankedCandidate>,
    pub references: Vec<Reference>,
    pub answer: String,
    pub status: AnswerStatus,
}

impl RequestState {
    pub fn new(question: String, history: Vec<ConversationTurn>) -> Self {
        Self {
            original_question: question.clone(),
            question,
            history,
            is_followup: false,
            context_summary: String::new(),
            vector_store_live: true,
            documents: Vec::new(),
            qualified_documents: Vec::new(),
            references: Vec::new(),
            answer: String::new(),
            status: AnswerStatus::Streaming,
        }
    }
}

/// Validate an incoming question against the length contract (§3).
pub fn validate_question(question: &str) -> Result<(), crate::Error> {
    let len = question.chars().count();
    if len < QUESTION_MIN_LEN || len > QUESTION_MAX_LEN {
        return Err(crate::Error::InvalidQuestion(format!(
            "question length {len} outside allowed range [{QUESTION_MIN_LEN}, {QUESTION_MAX_LEN}]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_parse_unknown_falls_back_to_faq() {
        assert_eq!(AgentLabel::parse_or_faq("faq"), AgentLabel::Faq);
        assert_eq!(AgentLabel::parse_or_faq("bogus"), AgentLabel::Faq);
        assert_eq!(AgentLabel::parse_or_faq(" Chatter "), AgentLabel::Chatter);
    }

    #[test]
    fn dedupe_preserves_first_seen_order() {
        let refs = vec![
            Reference::new("a", ReferenceKind::Faq),
            Reference::new("b", ReferenceKind::Document),
            Reference::new("a", ReferenceKind::Faq),
        ];
        let deduped = dedupe_references(refs);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].document_id, "a");
        assert_eq!(deduped[1].document_id, "b");
    }

    #[test]
    fn question_length_boundaries() {
        assert!(validate_question("abc").is_ok());
        assert!(validate_question("ab").is_err());
        assert!(validate_question(&"a".repeat(1000)).is_ok());
        assert!(validate_question(&"a".repeat(1001)).is_err());
    }

    #[test]
    fn answer_status_matches_wire_contract() {
        assert_eq!(serde_json::to_string(&AnswerStatus::Success).unwrap(), "\"SUCCESS\"");
        assert_eq!(serde_json::to_string(&AnswerStatus::NotFound).unwrap(), "\"NOT_FOUND\"");
        assert_eq!(serde_json::to_string(&AnswerStatus::Insufficient).unwrap(), "\"INSUFFICIENT\"");
    }
}
