//! Outgoing request assembly.
//!
//! [`build`] is pure: it reads the log it is given and never touches the store.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::prompts::REPORT_PERSONA;
use crate::session::{Message, ReferenceItem, Role};

/// Number of conversational messages forwarded per request.
pub const CONTEXT_WINDOW: usize = 6;

const MISSING_BODY: &str = "내용 없음";

/// One `{role, content}` entry of the generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl WireMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self::new(message.role(), message.content())
    }
}

/// Request body for the generation endpoint.
///
/// Serializes to `{"messages": [{"role": ..., "content": ...}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingPayload {
    pub messages: Vec<WireMessage>,
    /// The reply to this payload is a report; never sent over the wire.
    #[serde(skip)]
    pub is_report: bool,
}

impl OutgoingPayload {
    /// Messages excluding the persona, if any.
    pub fn conversational_len(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System || !self.is_report)
            .count()
    }
}

/// Builds the request for a new user utterance.
///
/// `history` must not already contain `new_user_text`; it is appended here.
/// When `analysis_mode` is on and references are selected, the last user
/// message is rewritten to carry the reference blocks and the report persona
/// is prepended.
pub fn build(
    history: &[Arc<Message>],
    new_user_text: &str,
    analysis_mode: bool,
    selected: &[ReferenceItem],
) -> OutgoingPayload {
    let keep = CONTEXT_WINDOW.saturating_sub(1);
    let start = history.len().saturating_sub(keep);

    let mut window: Vec<WireMessage> = history[start..]
        .iter()
        .map(|m| WireMessage::from(m.as_ref()))
        .collect();
    window.push(WireMessage::new(Role::User, new_user_text));

    let is_report = analysis_mode && !selected.is_empty();
    if !is_report {
        return OutgoingPayload {
            messages: window,
            is_report,
        };
    }

    if let Some(last) = window.last_mut() {
        last.content = with_references(new_user_text, selected);
    }

    let mut messages = Vec::with_capacity(window.len() + 1);
    messages.push(WireMessage::new(Role::System, REPORT_PERSONA));
    messages.extend(window);

    OutgoingPayload {
        messages,
        is_report,
    }
}

/// Formats the selected references as numbered blocks.
pub fn reference_blocks(selected: &[ReferenceItem]) -> String {
    let mut out = String::new();
    for (idx, item) in selected.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "[기사 {}]\n제목: {}\n링크: {}\n내용: {}",
            idx + 1,
            item.title,
            item.link,
            item.body().unwrap_or(MISSING_BODY)
        );
    }
    out
}

fn with_references(text: &str, selected: &[ReferenceItem]) -> String {
    format!("[참고 자료]\n{}\n\n[질문]\n{text}", reference_blocks(selected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(n: usize) -> Vec<Arc<Message>> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Arc::new(Message::user(format!("q{i}")))
                } else {
                    Arc::new(Message::assistant(format!("a{i}"), false))
                }
            })
            .collect()
    }

    fn refs() -> Vec<ReferenceItem> {
        vec![
            ReferenceItem::new("A", "https://n/a").with_content("본문 A"),
            ReferenceItem::new("B", "https://n/b").with_description("요약 B"),
        ]
    }

    #[test]
    fn test_plain_turn_passes_window_through() {
        let payload = build(&[], "Hello", false, &[]);
        assert!(!payload.is_report);
        assert_eq!(payload.messages, vec![WireMessage::new(Role::User, "Hello")]);
    }

    #[test]
    fn test_window_keeps_last_six() {
        let history = log(10);
        let payload = build(&history, "new", false, &[]);

        assert_eq!(payload.messages.len(), CONTEXT_WINDOW);
        assert_eq!(payload.messages[0].content, "a5");
        assert_eq!(payload.messages.last().unwrap().content, "new");
    }

    #[test]
    fn test_window_bound_with_persona() {
        for n in 0..12 {
            let payload = build(&log(n), "질문", true, &refs());
            assert!(payload.messages.len() <= CONTEXT_WINDOW + 1);
            assert!(payload.conversational_len() <= CONTEXT_WINDOW);
        }
    }

    #[test]
    fn test_analysis_mode_without_references_is_plain() {
        let payload = build(&log(2), "hi", true, &[]);
        assert!(!payload.is_report);
        assert!(payload.messages.iter().all(|m| m.role != Role::System));
        assert_eq!(payload.messages.last().unwrap().content, "hi");
    }

    #[test]
    fn test_references_without_analysis_mode_are_ignored() {
        let payload = build(&[], "hi", false, &refs());
        assert!(!payload.is_report);
        assert_eq!(payload.messages.len(), 1);
        assert_eq!(payload.messages[0].content, "hi");
    }

    #[test]
    fn test_report_turn_prepends_persona_and_injects_references() {
        let payload = build(&log(3), "분석해줘", true, &refs());
        assert!(payload.is_report);

        assert_eq!(payload.messages[0].role, Role::System);
        assert_eq!(payload.messages[0].content, REPORT_PERSONA);

        let last = payload.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(
            last.content,
            "[참고 자료]\n\
             [기사 1]\n제목: A\n링크: https://n/a\n내용: 본문 A\n\
             \n\
             [기사 2]\n제목: B\n링크: https://n/b\n내용: 요약 B\n\
             \n\n[질문]\n분석해줘"
        );

        // Earlier history is untouched
        assert_eq!(payload.messages[1].content, "q0");
    }

    #[test]
    fn test_reference_without_body_uses_placeholder() {
        let blocks = reference_blocks(&[ReferenceItem::new("C", "https://n/c")]);
        assert!(blocks.ends_with("내용: 내용 없음\n"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let history = log(4);
        assert_eq!(
            build(&history, "x", true, &refs()),
            build(&history, "x", true, &refs())
        );
    }

    #[test]
    fn test_payload_serializes_to_wire_shape() {
        let payload = build(&[], "Hello", false, &[]);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "messages": [{ "role": "user", "content": "Hello" }] })
        );
    }
}
