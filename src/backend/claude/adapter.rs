//! Claude CLI backend adapter

use async_trait::async_trait;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::encoder::encode_request;
use super::output::RawEvent;
use super::translator::Translator;
use crate::backend::invocations;
use crate::backend::runner::{Backend, InvocationRequest, InvocationSummary};
use crate::config::BackendConfig;
use crate::error::BridgeError;
use crate::{CanonicalEvent, FinishReason, UsageCounters};

/// Credential variable for direct API access. Explicitly unset so the
/// subprocess falls back to its own authentication.
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Trailing stderr lines folded into exit-error details.
const STDERR_TAIL_LINES: usize = 8;

pub struct ClaudeBackend {
    id: String,
}

impl ClaudeBackend {
    pub fn new() -> Self {
        Self {
            id: "claude".to_string(),
        }
    }

    /// Build command arguments.
    ///
    /// The format flags are fixed: the subprocess always speaks
    /// line-delimited JSON on both streams. Model and operating mode come
    /// from the request, falling back to the backend config.
    fn build_args(&self, request: &InvocationRequest, config: &BackendConfig) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--print".to_string(),
            "--verbose".to_string(),
            "--input-format".to_string(),
            "stream-json".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--include-partial-messages".to_string(),
        ];

        if let Some(session_id) = request.resume_session.as_deref() {
            args.push("--resume".to_string());
            args.push(session_id.to_string());
        }

        if let Some(model) = request.model.as_deref().or(config.model.as_deref()) {
            args.push("--model".to_string());
            args.push(model.to_string());
        }

        if let Some(mode) = request
            .permission_mode
            .as_deref()
            .or(config.permission_mode.as_deref())
        {
            if !mode.trim().is_empty() {
                args.push("--permission-mode".to_string());
                args.push(mode.to_string());
            }
        }

        args
    }
}

impl Default for ClaudeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for ClaudeBackend {
    async fn run(
        &self,
        request: &InvocationRequest,
        config: &BackendConfig,
        event_tx: mpsc::Sender<CanonicalEvent>,
    ) -> Result<InvocationSummary, BridgeError> {
        struct InvocationGuard {
            invocation_id: u64,
            registered: bool,
        }
        impl Drop for InvocationGuard {
            fn drop(&mut self) {
                if self.registered {
                    invocations::unregister(self.invocation_id);
                }
            }
        }

        let request_line = match encode_request(&request.conversation) {
            Ok(line) => line,
            Err(err) => return Err(reject(&event_tx, err).await),
        };

        let args = self.build_args(request, config);
        let binary = config.get_binary("claude").to_string();
        tracing::debug!(invocation_id = request.id, binary = %binary, "spawning backend process");

        let mut child = match Command::new(&binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(&config.env)
            .env_remove(API_KEY_ENV)
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                return Err(reject(&event_tx, BridgeError::ProcessSpawn { binary, source }).await);
            }
        };

        let cancelled = match child.id() {
            Some(pid) => invocations::register(request.id, pid, self.id()),
            None => Arc::new(AtomicBool::new(false)),
        };
        let _guard = InvocationGuard {
            invocation_id: request.id,
            registered: child.id().is_some(),
        };

        let Some(mut stdin) = child.stdin.take() else {
            let source = std::io::Error::other("stdin pipe unavailable");
            return Err(reject(&event_tx, BridgeError::StreamWrite(source)).await);
        };
        let Some(stdout) = child.stdout.take() else {
            let source = std::io::Error::other("stdout pipe unavailable");
            return Err(reject(&event_tx, BridgeError::ProcessSpawn { binary, source }).await);
        };
        let stderr = child.stderr.take();

        // The request is written once, then the input stream is closed: the
        // subprocess is single-turn per process instance.
        let writer = tokio::spawn(async move {
            stdin.write_all(request_line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.shutdown().await?;
            Ok::<(), std::io::Error>(())
        });

        let stderr_task = tokio::spawn(async move {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(line = %line, "backend stderr");
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail
        });

        let mut summary = InvocationSummary {
            session_id: request.resume_session.clone(),
            ..Default::default()
        };
        let mut translator = Translator::new();
        let mut output_text = String::new();

        // Sole producer of canonical events: ordering is total per
        // invocation, and a slow sink throttles this loop naturally.
        let mut reader = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            let event = match RawEvent::parse(&line) {
                Ok(event) => event,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping malformed output line");
                    continue;
                }
            };
            for canonical in translator.on_event(event) {
                if let CanonicalEvent::BlockDelta { text, .. } = &canonical {
                    output_text.push_str(text);
                }
                let _ = event_tx.send(canonical).await;
            }
        }

        let status = child.wait().await;
        let write_result = writer.await;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if translator.is_finished() {
            summary.success = translator.outcome() == Some(FinishReason::Stop);
            if !summary.success {
                summary.error = Some("backend reported an error result".to_string());
            }
            if let Ok(status) = &status {
                if !status.success() {
                    tracing::debug!(status = %status, "backend exited non-zero after its result record");
                }
            }
        } else {
            // A write failure is fatal only when the stream never reached a
            // terminal record on its own.
            if let Ok(Err(source)) = write_result {
                let err = BridgeError::StreamWrite(source);
                for canonical in translator.finish_abnormal(err.to_string()) {
                    let _ = event_tx.send(canonical).await;
                }
                return Err(err);
            }

            let detail = if cancelled.load(Ordering::SeqCst) {
                BridgeError::Cancelled.to_string()
            } else {
                let exit = match &status {
                    Ok(status) => describe_exit(status),
                    Err(err) => format!("unobservable status ({err})"),
                };
                let mut detail = BridgeError::ProcessExit { detail: exit }.to_string();
                if !stderr_tail.is_empty() {
                    let tail: Vec<String> = stderr_tail.into_iter().collect();
                    detail.push_str("; stderr: ");
                    detail.push_str(&tail.join(" | "));
                }
                detail
            };
            summary.error = Some(detail.clone());
            for canonical in translator.finish_abnormal(detail) {
                let _ = event_tx.send(canonical).await;
            }
        }

        if let Some(id) = translator.session_id() {
            summary.session_id = Some(id.to_string());
        }
        summary.usage = translator.usage();
        summary.cost_usd = translator.cost_usd();
        summary.duration_ms = translator.duration_ms();
        summary.output_text = if output_text.is_empty() {
            translator.take_result_text()
        } else {
            Some(output_text)
        };

        Ok(summary)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn is_available(&self) -> bool {
        std::process::Command::new("which")
            .arg("claude")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

/// Emit the terminal error event for a fault that rejects the invocation
/// before any stream exists, then hand the error back for propagation.
async fn reject(event_tx: &mpsc::Sender<CanonicalEvent>, err: BridgeError) -> BridgeError {
    let _ = event_tx
        .send(CanonicalEvent::Error {
            detail: err.to_string(),
            usage: UsageCounters::default(),
        })
        .await;
    err
}

fn describe_exit(status: &std::process::ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
