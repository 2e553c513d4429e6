//! Backend execution and management.
//!
//! This module is the seam between the host and its language-model
//! backends. Every backend is driven through the [`Backend`] trait and
//! translated into one canonical event vocabulary, so the rest of the
//! application consumes a uniform stream regardless of which adapter
//! produced it.
//!
//! # Architecture
//!
//! - **[`Backend`]** - the trait all adapters implement: run one invocation,
//!   stream canonical events, return an [`InvocationSummary`].
//! - **[`ClaudeBackend`]** - the subprocess bridge for the Claude CLI: it
//!   encodes the conversation onto the process's stdin, decodes the
//!   stream-json event lines from stdout, and re-emits them canonically.
//! - **[`BackendRegistry`]** - resolves backend ids to adapters.
//! - **[`invocations`]** - registry of running invocations for
//!   caller-triggered interrupt/kill.

pub mod claude;
pub mod invocations;
mod registry;
mod runner;

pub use claude::ClaudeBackend;
pub use registry::BackendRegistry;
pub use runner::{Backend, InvocationRequest, InvocationSummary};
