//! Conversation model passed to backends.

use serde::{Deserialize, Serialize};

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Prefix used when flattening a transcript into plain text.
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One unit of turn content.
///
/// Text-only backends drop [`ContentPart::Data`] parts with a warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// Opaque structured payload (images, attachments, editor context).
    Data {
        #[serde(default)]
        payload: serde_json::Value,
    },
}

/// One turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl ChatTurn {
    /// Create a turn with a single text part.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ContentPart::Text { text: text.into() }],
        }
    }

    /// Join the text parts of this turn, newline-separated. Non-text parts
    /// are counted into `dropped`.
    pub fn flattened_text(&self, dropped: &mut usize) -> String {
        let mut texts = Vec::new();
        for part in &self.parts {
            match part {
                ContentPart::Text { text } => texts.push(text.as_str()),
                ContentPart::Data { .. } => *dropped += 1,
            }
        }
        texts.join("\n")
    }
}

/// An ordered list of turns ending with the user turn to answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    pub turns: Vec<ChatTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-turn conversation from one user prompt.
    pub fn from_user_prompt(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![ChatTurn::text(Role::User, prompt)],
        }
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn has_user_turn(&self) -> bool {
        self.turns.iter().any(|t| t.role == Role::User)
    }
}
