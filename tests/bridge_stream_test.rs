//! End-to-end tests of the subprocess streaming bridge.
//!
//! A fake backend (shell script) stands in for the real CLI: it consumes
//! the request from stdin, replays canned wire lines on stdout, and exits.
//! The tests observe the canonical event sequence and the invocation
//! summary exactly as a host application would.

#![cfg(unix)]

mod common;

use std::time::Duration;

use tokio::sync::mpsc;

use colloquy::config::BackendConfig;
use colloquy::{
    Backend, BridgeError, CanonicalEvent, ClaudeBackend, Conversation, FinishReason,
    InvocationRequest, InvocationSummary,
};

async fn run_against_script(
    body: &str,
) -> (Result<InvocationSummary, BridgeError>, Vec<CanonicalEvent>) {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let script = common::write_fake_backend(&dir, "fake-backend", body);
    let config = BackendConfig {
        binary: Some(script.display().to_string()),
        ..Default::default()
    };
    let backend = ClaudeBackend::new();
    let request = InvocationRequest::new(Conversation::from_user_prompt("hello"));

    let (event_tx, mut event_rx) = mpsc::channel::<CanonicalEvent>(16);
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = event_rx.recv().await {
            events.push(event);
        }
        events
    });

    let result = backend.run(&request, &config, event_tx).await;
    let events = collector.await.expect("collector task");
    (result, events)
}

#[tokio::test]
async fn successful_invocation_produces_the_canonical_sequence() {
    let (result, events) = run_against_script(
        r#"printf '%s\n' '{"type":"init","session_id":"s1"}'
printf '%s\n' '{"type":"message","content":[{"type":"text","text":"hi"}]}'
printf '%s\n' '{"type":"result","subtype":"success","usage":{"input_tokens":3,"output_tokens":1}}'"#,
    )
    .await;

    assert_eq!(events.len(), 4);
    assert!(matches!(events[0], CanonicalEvent::BlockStart { id: 0 }));
    assert!(matches!(&events[1], CanonicalEvent::BlockDelta { id: 0, text } if text == "hi"));
    assert!(matches!(events[2], CanonicalEvent::BlockEnd { id: 0 }));
    match &events[3] {
        CanonicalEvent::Finish { reason, usage } => {
            assert_eq!(*reason, FinishReason::Stop);
            assert_eq!(usage.input_tokens, 3);
            assert_eq!(usage.output_tokens, 1);
        }
        other => panic!("expected finish, got {:?}", other),
    }

    let summary = result.expect("invocation should succeed");
    assert!(summary.success);
    assert_eq!(summary.session_id.as_deref(), Some("s1"));
    assert_eq!(summary.usage.input_tokens, 3);
    assert_eq!(summary.output_text.as_deref(), Some("hi"));
}

#[tokio::test]
async fn malformed_lines_are_skipped_without_aborting_the_stream() {
    let (result, events) = run_against_script(
        r#"printf '%s\n' 'this is not json'
printf '%s\n' '{"type":"init","session_id":"s1"}'
printf '%s\n' '{"broken":'
printf '%s\n' '{"type":"message","content":[{"type":"text","text":"hi"}]}'
printf '%s\n' ''
printf '%s\n' '{"type":"result","subtype":"success","usage":{"input_tokens":3,"output_tokens":1}}'"#,
    )
    .await;

    assert_eq!(events.len(), 4, "noise must not change the sequence: {:?}", events);
    assert!(matches!(events[0], CanonicalEvent::BlockStart { id: 0 }));
    assert!(matches!(events[3], CanonicalEvent::Finish { .. }));
    assert!(result.expect("invocation should succeed").success);
}

#[tokio::test]
async fn abnormal_exit_ends_in_an_error_event_with_the_exit_code() {
    let (result, events) = run_against_script(
        r#"printf '%s\n' '{"type":"init","session_id":"s1"}'
printf '%s\n' '{"type":"message","content":[{"type":"text","text":"par"}],"usage":{"input_tokens":7,"output_tokens":2}}'
echo 'backend blew up' >&2
exit 1"#,
    )
    .await;

    let summary = result.expect("process-level failure still yields a summary");
    assert!(!summary.success);

    match events.last().expect("at least the terminal event") {
        CanonicalEvent::Error { detail, usage } => {
            assert!(detail.contains("exit code 1"), "detail: {detail}");
            assert!(detail.contains("backend blew up"), "detail: {detail}");
            // Last partial usage survives the crash.
            assert_eq!(usage.input_tokens, 7);
            assert_eq!(usage.output_tokens, 2);
        }
        other => panic!("expected error, got {:?}", other),
    }
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1);
    // The open text block was closed before the terminal event.
    assert!(matches!(events[events.len() - 2], CanonicalEvent::BlockEnd { .. }));
}

#[tokio::test]
async fn tool_calls_and_results_share_the_correlation_id() {
    let (result, events) = run_against_script(
        r#"printf '%s\n' '{"type":"init","session_id":"s1"}'
printf '%s\n' '{"type":"message","content":[{"type":"tool_use","id":"call-1","name":"read_file","input":{"path":"a.rs"}}]}'
printf '%s\n' '{"type":"tool_result","tool_use_id":"call-1","content":"fn main() {}"}'
printf '%s\n' '{"type":"message","content":[{"type":"text","text":"done"}]}'
printf '%s\n' '{"type":"result","subtype":"success"}'"#,
    )
    .await;

    match &events[0] {
        CanonicalEvent::ToolCall { id, name, .. } => {
            assert_eq!(id, "call-1");
            assert_eq!(name, "read_file");
        }
        other => panic!("expected tool call, got {:?}", other),
    }
    match &events[1] {
        CanonicalEvent::ToolResult { id, unmatched, .. } => {
            assert_eq!(id, "call-1");
            assert!(!unmatched);
        }
        other => panic!("expected tool result, got {:?}", other),
    }
    assert!(result.expect("invocation should succeed").success);
}

#[tokio::test]
async fn error_result_subtype_finishes_with_error_reason() {
    let (result, events) = run_against_script(
        r#"printf '%s\n' '{"type":"result","subtype":"error_during_execution"}'"#,
    )
    .await;

    assert!(matches!(
        events.last(),
        Some(CanonicalEvent::Finish { reason: FinishReason::Error, .. })
    ));
    let summary = result.expect("a reported error result is still a summary");
    assert!(!summary.success);
    assert!(summary.error.is_some());
}

#[tokio::test]
async fn spawn_failure_is_fatal_but_still_terminates_the_stream() {
    let config = BackendConfig {
        binary: Some("/nonexistent/colloquy-test-backend".to_string()),
        ..Default::default()
    };
    let backend = ClaudeBackend::new();
    let request = InvocationRequest::new(Conversation::from_user_prompt("hello"));

    let (event_tx, mut event_rx) = mpsc::channel::<CanonicalEvent>(16);
    let result = backend.run(&request, &config, event_tx).await;

    assert!(matches!(result, Err(BridgeError::ProcessSpawn { .. })));
    let event = event_rx.recv().await.expect("terminal event");
    assert!(matches!(event, CanonicalEvent::Error { .. }));
    assert!(event_rx.recv().await.is_none(), "exactly one event");
}

#[tokio::test]
async fn conversation_without_user_turn_is_rejected_before_spawning() {
    let backend = ClaudeBackend::new();
    // The binary does not exist; if encoding rejected the invocation first,
    // spawning is never attempted and the error stays MissingUserTurn.
    let config = BackendConfig {
        binary: Some("/nonexistent/colloquy-test-backend".to_string()),
        ..Default::default()
    };
    let request = InvocationRequest::new(Conversation::new());

    let (event_tx, mut event_rx) = mpsc::channel::<CanonicalEvent>(16);
    let result = backend.run(&request, &config, event_tx).await;

    assert!(matches!(result, Err(BridgeError::MissingUserTurn)));
    assert!(matches!(
        event_rx.recv().await,
        Some(CanonicalEvent::Error { .. })
    ));
}

#[tokio::test]
async fn kill_cancels_a_running_invocation() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let script = common::write_fake_backend(
        &dir,
        "fake-backend",
        r#"printf '%s\n' '{"type":"init","session_id":"s1"}'
exec sleep 30"#,
    );
    let config = BackendConfig {
        binary: Some(script.display().to_string()),
        ..Default::default()
    };
    let request = InvocationRequest::new(Conversation::from_user_prompt("hello"));
    let invocation_id = request.id;

    let (event_tx, mut event_rx) = mpsc::channel::<CanonicalEvent>(16);
    let handle = tokio::spawn(async move {
        let backend = ClaudeBackend::new();
        backend.run(&request, &config, event_tx).await
    });

    let mut killed = false;
    for _ in 0..200 {
        if colloquy::backend::invocations::kill(invocation_id).expect("kill") {
            killed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(killed, "invocation was never registered");

    let summary = handle
        .await
        .expect("run task")
        .expect("cancellation still yields a summary");
    assert!(!summary.success);
    assert!(
        summary.error.as_deref().unwrap_or("").contains("cancelled"),
        "error: {:?}",
        summary.error
    );

    let mut last = None;
    while let Some(event) = event_rx.recv().await {
        last = Some(event);
    }
    match last {
        Some(CanonicalEvent::Error { detail, .. }) => {
            assert!(detail.contains("cancelled"), "detail: {detail}");
        }
        other => panic!("expected terminal error, got {:?}", other),
    }
}
