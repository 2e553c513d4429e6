//! Claude CLI output stream parsing
//!
//! The subprocess frames events as one JSON object per line. Each line
//! decodes into one [`RawEvent`] by its `type` discriminant; unknown
//! discriminants decode to [`RawEvent::Unknown`] and malformed lines are
//! reported as recoverable errors. Parsing is a pure, order-preserving
//! filter over the line stream - a bad line never aborts it.

use serde::Deserialize;

use crate::error::BridgeError;

/// Events from the stream-json output, one per line.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    /// Handshake record carrying the backend-assigned session id.
    Init {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        tools: Vec<String>,
        #[serde(default)]
        model: Option<String>,
    },

    /// Assistant output: ordered content blocks plus incremental usage.
    Message {
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        content: Vec<WireBlock>,
        #[serde(default)]
        usage: Option<WireUsage>,
    },

    /// Result of an earlier tool invocation, correlated by `tool_use_id`.
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },

    /// Terminal record closing the invocation.
    Result {
        subtype: String,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        usage: Option<WireUsage>,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default, alias = "cost_usd")]
        total_cost_usd: Option<f64>,
        #[serde(default)]
        duration_ms: Option<u64>,
    },

    /// Any record kind this bridge does not know. Skipped by the translator.
    #[serde(other)]
    Unknown,
}

/// Content block inside a message record.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireBlock {
    /// Text run. Whole-block in some protocol variants, an incremental
    /// delta in others; the translator normalizes both.
    Text { text: String },

    /// Tool invocation request
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(other)]
    Unknown,
}

/// Usage fields as the wire reports them.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
}

impl RawEvent {
    /// Decode one non-blank output line into a raw event.
    pub fn parse(line: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(line).map_err(|e| BridgeError::MalformedEvent(e.to_string()))
    }
}
