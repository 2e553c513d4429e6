//! Shared test utilities for bridge integration tests

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Write an executable fake backend script into `dir`.
///
/// The script consumes stdin first (the bridge writes one request line and
/// closes the stream) and then runs `body`, which typically replays canned
/// wire lines on stdout.
pub fn write_fake_backend(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    let script = format!("#!/bin/sh\ncat >/dev/null\n{body}\n");
    fs::write(&path, script).expect("failed to write fake backend script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("failed to mark fake backend executable");
    }

    path
}
