//! Core domain types for Colloquy

mod conversation;
mod events;

pub use conversation::{ChatTurn, ContentPart, Conversation, Role};
pub use events::{CanonicalEvent, FinishReason, UsageCounters};
