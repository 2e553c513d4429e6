//! Canonical streaming events emitted by backend bridges.
//!
//! Every backend, whatever its wire protocol, is translated into this one
//! event vocabulary. Downstream consumers (session storage, rendering) only
//! ever see [`CanonicalEvent`] sequences and never backend-specific records.
//!
//! Per invocation the sequence obeys:
//! 1. for every block id, `BlockStart` precedes all `BlockDelta`s, which
//!    precede exactly one `BlockEnd`, and nothing follows for that id;
//! 2. exactly one terminal event (`Finish` or `Error`) is emitted, last;
//! 3. a `ToolResult` reuses the correlation id of its `ToolCall` unchanged.

use serde::{Deserialize, Serialize};

/// Token usage counters for one invocation.
///
/// Counters are monotonically non-decreasing while the invocation streams;
/// the cache fields are only present when the backend reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_tokens: Option<u64>,
}

/// Why an invocation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The backend completed the turn normally.
    Stop,
    /// The backend reported an error result.
    Error,
}

impl FinishReason {
    /// Derive the reason from a result record's subtype.
    pub fn from_subtype(subtype: &str) -> Self {
        if subtype == "success" {
            FinishReason::Stop
        } else {
            FinishReason::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Error => "error",
        }
    }
}

/// Canonical event union delivered to the event sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalEvent {
    /// An assistant text block opened.
    BlockStart { id: usize },

    /// Text appended to an open block.
    BlockDelta { id: usize, text: String },

    /// A block closed; no further events carry this id.
    BlockEnd { id: usize },

    /// The assistant invoked a tool. Atomic, never streamed incrementally.
    ToolCall {
        id: String,
        name: String,
        args: serde_json::Value,
    },

    /// A tool produced a result. `unmatched` flags results whose id no
    /// prior `ToolCall` announced - a protocol anomaly surfaced, not
    /// swallowed.
    ToolResult {
        id: String,
        payload: serde_json::Value,
        is_error: bool,
        unmatched: bool,
    },

    /// Terminal: the backend reported a result record.
    Finish {
        reason: FinishReason,
        usage: UsageCounters,
    },

    /// Terminal: the invocation ended without a result record (abnormal
    /// exit, cancellation, or a fatal fault before streaming). Carries the
    /// last partial usage observed.
    Error { detail: String, usage: UsageCounters },
}

impl CanonicalEvent {
    /// Whether this event ends the invocation's sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CanonicalEvent::Finish { .. } | CanonicalEvent::Error { .. })
    }
}
