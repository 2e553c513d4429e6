//! Generic backend trait

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use crate::config::BackendConfig;
use crate::error::BridgeError;
use crate::{CanonicalEvent, Conversation, UsageCounters};

static NEXT_INVOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// One request/response cycle handed to a backend.
///
/// Owned exclusively by the caller that created it; the id keys the
/// invocation in the running-invocation registry for interrupt/kill.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    /// Process-wide unique invocation id.
    pub id: u64,

    /// Ordered turns ending with the user turn to answer.
    pub conversation: Conversation,

    /// Model identifier, overriding the backend's configured default.
    pub model: Option<String>,

    /// Operating mode (permission mode) for the backend process.
    pub permission_mode: Option<String>,

    /// Backend session id from an earlier invocation to resume.
    pub resume_session: Option<String>,
}

impl InvocationRequest {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            id: NEXT_INVOCATION_ID.fetch_add(1, Ordering::Relaxed),
            conversation,
            model: None,
            permission_mode: None,
            resume_session: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_permission_mode(mut self, mode: Option<String>) -> Self {
        self.permission_mode = mode;
        self
    }

    pub fn with_resume_session(mut self, session: Option<String>) -> Self {
        self.resume_session = session;
        self
    }
}

/// Result summary of one invocation, delivered next to the event stream.
#[derive(Debug, Clone, Default)]
pub struct InvocationSummary {
    /// Whether the backend reported a successful result.
    pub success: bool,

    /// Error detail if the invocation ended in a terminal error event.
    pub error: Option<String>,

    /// Backend-assigned session id, usable for resuming.
    pub session_id: Option<String>,

    /// Final token usage (last result record, or last partial on abnormal exit).
    pub usage: UsageCounters,

    /// Total cost in USD, when the backend reports it.
    pub cost_usd: Option<f64>,

    /// Wall-clock duration in milliseconds, when the backend reports it.
    pub duration_ms: Option<u64>,

    /// Concatenation of the streamed assistant text.
    pub output_text: Option<String>,
}

/// Trait for backend adapters.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run one invocation, streaming canonical events into `event_tx`.
    ///
    /// The sink always receives exactly one terminal event (`Finish` or
    /// `Error`), even when this method returns `Err`.
    async fn run(
        &self,
        request: &InvocationRequest,
        config: &BackendConfig,
        event_tx: mpsc::Sender<CanonicalEvent>,
    ) -> Result<InvocationSummary, BridgeError>;

    /// Get the backend ID
    fn id(&self) -> &str;

    /// Check if this backend is available (binary exists)
    fn is_available(&self) -> bool;
}
