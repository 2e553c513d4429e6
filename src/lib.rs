//! Colloquy - converse with coding-agent CLIs
//!
//! Colloquy turns a conversation into an invocation of an external
//! coding-agent CLI and streams the reply back as one canonical, ordered
//! event sequence. Backends are long-lived subprocesses speaking their own
//! line-delimited JSON protocols over stdin/stdout; each adapter bridges
//! one of them onto the shared [`CanonicalEvent`] vocabulary, so consumers
//! never see backend-specific records.
//!
//! The core flow for one invocation:
//!
//! 1. the conversation is encoded into the subprocess's request line,
//! 2. the process is spawned, fed once on stdin, and supervised,
//! 3. its output lines are decoded and translated into canonical events,
//! 4. exactly one terminal event (`finish` or `error`) closes the stream.

pub mod backend;
pub mod config;
pub mod domain;
pub mod error;

pub use backend::{Backend, BackendRegistry, ClaudeBackend, InvocationRequest, InvocationSummary};
pub use domain::*;
pub use error::BridgeError;
