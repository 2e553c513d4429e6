//! Claude CLI backend: subprocess bridge speaking stream-json over stdio.

mod adapter;
mod encoder;
mod output;
mod translator;

pub use adapter::ClaudeBackend;
pub use encoder::encode_request;
pub use output::{RawEvent, WireBlock, WireUsage};
pub use translator::{Translator, UsageMeter};
