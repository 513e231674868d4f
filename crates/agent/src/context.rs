//! Follow-up detection, sliding-window context construction, and the
//! Classifier's bounded rewrite cache (§4.1, §9).

use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use via_rag_core::{ConversationTurn, TurnRole};

const ANAPHORA: &[&str] = &["nó", "cái đó", "điều đó", "phần đó"];
const ORDINALS: &[&str] = &["đầu tiên", "cuối cùng"];
const CONTINUATION: &[&str] = &["tiếp theo", "còn", "thêm", "chi tiết"];
const SHORT_QUERY_TOKENS: usize = 5;

static ORDINAL_PATTERN: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"thứ\s*\d+").expect("static pattern is valid"));

/// Lightweight pattern gate the spec adopts over the legacy heavy rule-based
/// detector (§9): only this gate decides whether a question is a follow-up
/// candidate, before any LLM rewrite is attempted. Empty or single-turn
/// history never qualifies (§8): there is no prior exchange to resolve a
/// pronoun or ellipsis against.
pub fn is_followup_candidate(question: &str, history: &[ConversationTurn]) -> bool {
    if history.len() < 2 {
        return false;
    }

    let normalized = question.trim().to_lowercase();

    if ANAPHORA.iter().any(|p| normalized.contains(p))
        || ORDINALS.iter().any(|p| normalized.contains(p))
        || CONTINUATION.iter().any(|p| normalized.contains(p))
        || ORDINAL_PATTERN.is_match(&normalized)
    {
        return true;
    }

    normalized.split_whitespace().count() < SHORT_QUERY_TOKENS
}

/// Builds a compact window string from the last 2 turns, each truncated to
/// ~150 chars, joined with `" | "` and formatted `"{Hỏi/Đáp}: {content}"`.
pub fn build_context_window(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .rev()
        .take(2)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(|turn| {
            let label = match turn.role {
                TurnRole::User => "Hỏi",
                TurnRole::Assistant => "Đáp",
            };
            format!("{label}: {}", truncate_chars(&turn.content, 150))
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Extracts a short "what we were just discussing" summary from the last
/// user/assistant pair, for the Generator's follow-up prompt (§4.5).
pub fn extract_context_summary(history: &[ConversationTurn]) -> String {
    let mut prev_answer: Option<&str> = None;
    for turn in history.iter().rev() {
        match turn.role {
            TurnRole::Assistant if prev_answer.is_none() => {
                prev_answer = Some(turn.content.as_str());
            }
            TurnRole::User => {
                if let Some(answer) = prev_answer {
                    return format!(
                        "Chủ đề đang thảo luận: {}\nĐã trả lời: {}...",
                        turn.content,
                        truncate_chars(answer, 200)
                    );
                }
            }
            _ => {}
        }
    }
    String::new()
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Bounded LRU cache mapping `(context prefix, question)` to a standalone
/// rewrite. Shared across requests; lost updates under contention are
/// acceptable (§5, §9).
pub struct RewriteCache {
    inner: Mutex<LruCache<String, String>>,
}

impl RewriteCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to >= 1");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn key(context: &str, question: &str) -> String {
        format!("{}::{question}", truncate_chars(context, 100))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().get(key).cloned()
    }

    pub fn put(&self, key: String, rewrite: String) {
        self.inner.lock().put(key, rewrite);
    }
}

impl Default for RewriteCache {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(content: &str) -> ConversationTurn {
        ConversationTurn {
            role: TurnRole::User,
            content: content.to_string(),
        }
    }

    fn assistant(content: &str) -> ConversationTurn {
        ConversationTurn {
            role: TurnRole::Assistant,
            content: content.to_string(),
        }
    }

    fn two_turn_history() -> Vec<ConversationTurn> {
        vec![
            user("Khung năng lực số là gì?"),
            assistant("Là bộ tiêu chuẩn về kỹ năng số quốc gia."),
        ]
    }

    #[test]
    fn detects_anaphora_as_followup() {
        assert!(is_followup_candidate("Cái đó giá bao nhiêu?", &two_turn_history()));
    }

    #[test]
    fn detects_ordinal_phrase_as_followup() {
        assert!(is_followup_candidate("Chi tiết kỹ năng số 3", &two_turn_history()));
    }

    #[test]
    fn detects_short_query_as_followup() {
        assert!(is_followup_candidate("Còn gì nữa", &two_turn_history()));
    }

    #[test]
    fn long_standalone_question_is_not_a_followup() {
        assert!(!is_followup_candidate(
            "Khung năng lực số quốc gia được ban hành vào năm nào và áp dụng cho đối tượng nào?",
            &two_turn_history()
        ));
    }

    #[test]
    fn single_turn_history_never_triggers_followup_window() {
        let history = vec![user("Khung năng lực số là gì?")];
        let window = build_context_window(&history);
        assert_eq!(window, "Hỏi: Khung năng lực số là gì?");
    }

    #[test]
    fn single_turn_history_never_triggers_followup_detection() {
        let history = vec![user("Khung năng lực số là gì?")];
        assert!(!is_followup_candidate("Cái đó giá bao nhiêu?", &history));
        assert!(!is_followup_candidate("Cái đó giá bao nhiêu?", &[]));
    }

    #[test]
    fn context_summary_uses_last_qa_pair() {
        let history = vec![
            user("Khung năng lực số có 6 nhóm kỹ năng"),
            assistant("Đúng vậy, khung năng lực số gồm 6 nhóm kỹ năng chính."),
        ];
        let summary = extract_context_summary(&history);
        assert!(summary.contains("Chủ đề đang thảo luận"));
        assert!(summary.contains("Đã trả lời"));
    }

    #[test]
    fn rewrite_cache_roundtrips() {
        let cache = RewriteCache::new(2);
        let key = RewriteCache::key("Hỏi: ...", "Chi tiết kỹ năng số 3");
        cache.put(key.clone(), "nhóm kỹ năng thứ 3 là gì".to_string());
        assert_eq!(cache.get(&key).as_deref(), Some("nhóm kỹ năng thứ 3 là gì"));
    }
}
