//! Registry of running invocations.
//!
//! Cancellation is caller-triggered and must work without holding the
//! invocation future, so every spawned backend process is registered here by
//! invocation id. Interrupting or killing also marks the invocation's cancel
//! flag, letting the read loop attribute the resulting stream closure to
//! cancellation rather than a crash.

use anyhow::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RunningInvocation {
    pub pid: u32,
    pub backend_id: String,
    cancelled: Arc<AtomicBool>,
}

static RUNNING: Lazy<Mutex<HashMap<u64, RunningInvocation>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Register a spawned backend process. Returns the invocation's cancel flag.
pub fn register(invocation_id: u64, pid: u32, backend_id: impl Into<String>) -> Arc<AtomicBool> {
    let cancelled = Arc::new(AtomicBool::new(false));
    let mut guard = RUNNING.lock().unwrap_or_else(|e| e.into_inner());
    guard.insert(
        invocation_id,
        RunningInvocation {
            pid,
            backend_id: backend_id.into(),
            cancelled: cancelled.clone(),
        },
    );
    cancelled
}

pub fn unregister(invocation_id: u64) {
    let mut guard = RUNNING.lock().unwrap_or_else(|e| e.into_inner());
    guard.remove(&invocation_id);
}

pub fn get(invocation_id: u64) -> Option<RunningInvocation> {
    let guard = RUNNING.lock().unwrap_or_else(|e| e.into_inner());
    guard.get(&invocation_id).cloned()
}

/// Send SIGINT to the process of the given invocation, marking it cancelled.
pub fn interrupt(invocation_id: u64) -> Result<bool> {
    signal(invocation_id, Signal::Interrupt)
}

/// Send SIGKILL to the process of the given invocation, marking it cancelled.
/// Killing a process that has already exited is a no-op, not an error.
pub fn kill(invocation_id: u64) -> Result<bool> {
    signal(invocation_id, Signal::Kill)
}

enum Signal {
    Interrupt,
    Kill,
}

fn signal(invocation_id: u64, signal: Signal) -> Result<bool> {
    let Some(inv) = get(invocation_id) else {
        return Ok(false);
    };
    inv.cancelled.store(true, Ordering::SeqCst);

    #[cfg(unix)]
    unsafe {
        let sig = match signal {
            Signal::Interrupt => libc::SIGINT,
            Signal::Kill => libc::SIGKILL,
        };
        // ESRCH (process already gone) still counts as cancelled.
        let _ = libc::kill(inv.pid as i32, sig);
        return Ok(true);
    }

    #[cfg(not(unix))]
    {
        let _ = signal;
        Ok(true)
    }
}
