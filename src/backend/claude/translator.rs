//! Translation of raw wire records into the canonical event sequence.
//!
//! One [`Translator`] lives for one invocation and is driven synchronously
//! by the read loop: every decoded [`RawEvent`] maps to zero or more
//! [`CanonicalEvent`]s, in order. The protocol delivers text either as whole
//! blocks or as repeated incremental deltas depending on the backend
//! version; both are normalized here with open-if-needed logic keyed by the
//! block's index, never by special-casing protocol variants.

use std::collections::{BTreeMap, HashSet};

use super::output::{RawEvent, WireBlock, WireUsage};
use crate::error::BridgeError;
use crate::{CanonicalEvent, FinishReason, UsageCounters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Streaming,
    Finished,
}

/// Running token-usage state.
///
/// Counters never decrease: a record reporting smaller counts than already
/// seen is out-of-order noise and is ignored, logged for diagnostics.
#[derive(Debug, Default)]
pub struct UsageMeter {
    current: UsageCounters,
}

impl UsageMeter {
    pub fn record(&mut self, wire: &WireUsage) {
        let current = &mut self.current;
        if wire.input_tokens < current.input_tokens || wire.output_tokens < current.output_tokens {
            tracing::debug!(
                input_tokens = wire.input_tokens,
                output_tokens = wire.output_tokens,
                "ignoring usage regression"
            );
        }
        current.input_tokens = current.input_tokens.max(wire.input_tokens);
        current.output_tokens = current.output_tokens.max(wire.output_tokens);
        if let Some(read) = wire.cache_read_input_tokens {
            current.cache_read_tokens = Some(current.cache_read_tokens.unwrap_or(0).max(read));
        }
        if let Some(write) = wire.cache_creation_input_tokens {
            current.cache_write_tokens = Some(current.cache_write_tokens.unwrap_or(0).max(write));
        }
    }

    pub fn snapshot(&self) -> UsageCounters {
        self.current
    }
}

/// Stateful mapper from raw records to the canonical event sequence.
///
/// Block sub-state is tracked through `open_blocks` and `next_block_id`:
/// a wire index absent from both is unopened, present in `open_blocks` is
/// open, and a previously assigned id no longer in the map is closed. A
/// closed wire index that produces text again gets a fresh canonical id, so
/// the per-id lifecycle (start, deltas, one end) is never violated.
pub struct Translator {
    phase: Phase,
    /// Wire block index -> canonical block id, open blocks only.
    open_blocks: BTreeMap<usize, usize>,
    next_block_id: usize,
    session_id: Option<String>,
    usage: UsageMeter,
    tool_ids: HashSet<String>,
    outcome: Option<FinishReason>,
    result_text: Option<String>,
    cost_usd: Option<f64>,
    duration_ms: Option<u64>,
}

impl Translator {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            open_blocks: BTreeMap::new(),
            next_block_id: 0,
            session_id: None,
            usage: UsageMeter::default(),
            tool_ids: HashSet::new(),
            outcome: None,
            result_text: None,
            cost_usd: None,
            duration_ms: None,
        }
    }

    /// Feed one decoded record; returns the canonical events it maps to.
    /// Records arriving after the terminal record are dropped.
    pub fn on_event(&mut self, event: RawEvent) -> Vec<CanonicalEvent> {
        let mut out = Vec::new();
        if self.phase == Phase::Finished {
            tracing::debug!("dropping record received after the terminal result");
            return out;
        }

        match event {
            RawEvent::Init { session_id, tools, model } => {
                self.phase = Phase::Streaming;
                if let Some(id) = session_id.filter(|s| !s.is_empty()) {
                    tracing::debug!(
                        session_id = %id,
                        tools = tools.len(),
                        model = model.as_deref().unwrap_or("default"),
                        "backend session started"
                    );
                    self.session_id.get_or_insert(id);
                }
            }

            RawEvent::Message { content, usage, .. } => {
                self.phase = Phase::Streaming;
                if let Some(usage) = usage {
                    self.usage.record(&usage);
                }
                for (index, block) in content.into_iter().enumerate() {
                    match block {
                        WireBlock::Text { text } => {
                            if text.is_empty() {
                                continue;
                            }
                            self.close_open_blocks_below(index, &mut out);
                            let id = self.open_if_needed(index, &mut out);
                            out.push(CanonicalEvent::BlockDelta { id, text });
                        }
                        WireBlock::ToolUse { id, name, input } => {
                            // A tool invocation at this index means every
                            // block up to and including it has stopped.
                            self.close_open_blocks_through(index, &mut out);
                            self.tool_ids.insert(id.clone());
                            out.push(CanonicalEvent::ToolCall { id, name, args: input });
                        }
                        WireBlock::Unknown => {
                            tracing::debug!(index, "skipping unrecognized content block");
                        }
                    }
                }
            }

            RawEvent::ToolResult { tool_use_id, content, is_error } => {
                self.phase = Phase::Streaming;
                let unmatched = !self.tool_ids.contains(&tool_use_id);
                if unmatched {
                    let anomaly = BridgeError::UnmatchedToolResult {
                        tool_use_id: tool_use_id.clone(),
                    };
                    tracing::warn!(error = %anomaly, "surfacing unmatched tool result");
                }
                out.push(CanonicalEvent::ToolResult {
                    id: tool_use_id,
                    payload: content,
                    is_error,
                    unmatched,
                });
            }

            RawEvent::Result {
                subtype,
                result,
                usage,
                session_id,
                total_cost_usd,
                duration_ms,
            } => {
                if let Some(usage) = usage {
                    self.usage.record(&usage);
                }
                if self.session_id.is_none() {
                    self.session_id = session_id.filter(|s| !s.is_empty());
                }
                self.result_text = result;
                self.cost_usd = total_cost_usd;
                self.duration_ms = duration_ms;

                self.close_all_open_blocks(&mut out);
                let reason = FinishReason::from_subtype(&subtype);
                self.outcome = Some(reason);
                out.push(CanonicalEvent::Finish {
                    reason,
                    usage: self.usage.snapshot(),
                });
                self.phase = Phase::Finished;
            }

            RawEvent::Unknown => {
                tracing::debug!("skipping unrecognized record kind");
            }
        }

        out
    }

    /// Terminate the sequence without a result record (abnormal exit,
    /// cancellation, fatal fault). Emits block ends for anything still open
    /// followed by the terminal error event carrying the last partial usage.
    /// No-op when a terminal event was already emitted.
    pub fn finish_abnormal(&mut self, detail: impl Into<String>) -> Vec<CanonicalEvent> {
        let mut out = Vec::new();
        if self.phase == Phase::Finished {
            return out;
        }
        self.close_all_open_blocks(&mut out);
        self.outcome = Some(FinishReason::Error);
        out.push(CanonicalEvent::Error {
            detail: detail.into(),
            usage: self.usage.snapshot(),
        });
        self.phase = Phase::Finished;
        out
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn outcome(&self) -> Option<FinishReason> {
        self.outcome
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn usage(&self) -> UsageCounters {
        self.usage.snapshot()
    }

    pub fn cost_usd(&self) -> Option<f64> {
        self.cost_usd
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Final text from the result record, if the backend reported one.
    pub fn take_result_text(&mut self) -> Option<String> {
        self.result_text.take()
    }

    fn open_if_needed(&mut self, index: usize, out: &mut Vec<CanonicalEvent>) -> usize {
        if let Some(&id) = self.open_blocks.get(&index) {
            return id;
        }
        let id = self.next_block_id;
        self.next_block_id += 1;
        self.open_blocks.insert(index, id);
        out.push(CanonicalEvent::BlockStart { id });
        id
    }

    fn close_open_blocks_below(&mut self, index: usize, out: &mut Vec<CanonicalEvent>) {
        let closing: Vec<usize> = self.open_blocks.range(..index).map(|(&k, _)| k).collect();
        for key in closing {
            if let Some(id) = self.open_blocks.remove(&key) {
                out.push(CanonicalEvent::BlockEnd { id });
            }
        }
    }

    fn close_open_blocks_through(&mut self, index: usize, out: &mut Vec<CanonicalEvent>) {
        self.close_open_blocks_below(index + 1, out);
    }

    fn close_all_open_blocks(&mut self, out: &mut Vec<CanonicalEvent>) {
        let open = std::mem::take(&mut self.open_blocks);
        for (_, id) in open {
            out.push(CanonicalEvent::BlockEnd { id });
        }
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}
