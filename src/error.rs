//! Error taxonomy for the backend bridge.
//!
//! Faults fall into two classes with different propagation rules:
//!
//! - **Fatal** faults ([`BridgeError::MissingUserTurn`],
//!   [`BridgeError::ProcessSpawn`], [`BridgeError::StreamWrite`]) reject the
//!   invocation; the bridge emits one terminal `error` event so sinks never
//!   hang, then returns the error to the caller.
//! - **Recovered** faults ([`BridgeError::MalformedEvent`],
//!   [`BridgeError::UnmatchedToolResult`]) are logged or surfaced as flags on
//!   the event that carries them and never abort the stream.
//!
//! Process exit without a result record and caller cancellation end the
//! invocation in a terminal `error` event whose detail is the display form of
//! [`BridgeError::ProcessExit`] / [`BridgeError::Cancelled`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The conversation holds no user turn, so there is nothing to answer.
    #[error("conversation has no user turn to answer")]
    MissingUserTurn,

    /// The backend binary could not be started.
    #[error("failed to spawn backend process `{binary}`: {source}")]
    ProcessSpawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the encoded request to the backend's input stream failed.
    #[error("failed to write request to backend process: {0}")]
    StreamWrite(#[source] std::io::Error),

    /// The backend process terminated before emitting a result record.
    #[error("backend process exited with {detail} before reporting a result")]
    ProcessExit { detail: String },

    /// The caller cancelled the invocation.
    #[error("invocation cancelled by caller")]
    Cancelled,

    /// An output line was not a well-formed event record. Recovered: the
    /// line is skipped and the stream continues.
    #[error("malformed backend event: {0}")]
    MalformedEvent(String),

    /// A tool result arrived whose correlation id matches no prior tool
    /// call. Recovered: the result is emitted flagged as unmatched.
    #[error("tool result `{tool_use_id}` has no matching tool call")]
    UnmatchedToolResult { tool_use_id: String },
}
