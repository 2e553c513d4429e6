//! Request encoding for the Claude CLI stdin protocol.
//!
//! The subprocess is single-turn per process instance and takes exactly one
//! line-delimited JSON request on stdin. The conversation is flattened into
//! plain text with role prefixes; non-text parts are dropped with a warning
//! since this transport only carries text.

use serde::Serialize;

use crate::error::BridgeError;
use crate::Conversation;

#[derive(Debug, Serialize)]
struct RequestLine<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    message: RequestMessage<'a>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Serialize a conversation into the single request line written to the
/// backend's input stream (without the trailing newline).
///
/// Fails with [`BridgeError::MissingUserTurn`] when there is no user turn to
/// answer; the invocation must be rejected before any subprocess is spawned.
pub fn encode_request(conversation: &Conversation) -> Result<String, BridgeError> {
    if !conversation.has_user_turn() {
        return Err(BridgeError::MissingUserTurn);
    }

    let mut dropped = 0usize;
    let mut parts = Vec::with_capacity(conversation.turns.len());
    for turn in &conversation.turns {
        let text = turn.flattened_text(&mut dropped);
        parts.push(format!("{}: {}", turn.role.label(), text));
    }
    if dropped > 0 {
        tracing::warn!(dropped, "dropped non-text content parts from request");
    }

    let content = parts.join("\n\n");
    let line = RequestLine {
        kind: "user",
        message: RequestMessage {
            role: "user",
            content: &content,
        },
    };

    // Infallible for this shape; treated as a write fault if it ever isn't.
    serde_json::to_string(&line)
        .map_err(|e| BridgeError::StreamWrite(std::io::Error::other(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatTurn, ContentPart, Role};

    #[test]
    fn flattens_roles_into_one_user_request() {
        let mut conversation = Conversation::new();
        conversation.push(ChatTurn::text(Role::System, "be brief"));
        conversation.push(ChatTurn::text(Role::User, "hello"));
        conversation.push(ChatTurn::text(Role::Assistant, "hi"));
        conversation.push(ChatTurn::text(Role::User, "and again"));

        let line = encode_request(&conversation).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "user");
        assert_eq!(value["message"]["role"], "user");
        let content = value["message"]["content"].as_str().unwrap();
        assert_eq!(
            content,
            "System: be brief\n\nUser: hello\n\nAssistant: hi\n\nUser: and again"
        );
    }

    #[test]
    fn rejects_conversation_without_user_turn() {
        let mut conversation = Conversation::new();
        conversation.push(ChatTurn::text(Role::System, "be brief"));

        let err = encode_request(&conversation).unwrap_err();
        assert!(matches!(err, BridgeError::MissingUserTurn));
    }

    #[test]
    fn drops_non_text_parts_but_keeps_the_turn() {
        let mut conversation = Conversation::new();
        conversation.push(ChatTurn {
            role: Role::User,
            parts: vec![
                ContentPart::Text { text: "look at this".into() },
                ContentPart::Data { payload: serde_json::json!({"image": "..."}) },
            ],
        });

        let line = encode_request(&conversation).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["message"]["content"], "User: look at this");
    }

    #[test]
    fn request_is_a_single_line() {
        let conversation = Conversation::from_user_prompt("multi\nline\nprompt");
        let line = encode_request(&conversation).unwrap();
        assert_eq!(line.lines().count(), 1);
    }
}
