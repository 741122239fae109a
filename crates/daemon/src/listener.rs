//! Binding the daemon's local stream socket.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::net::UnixListener;

/// Bind the socket at `path`, removing an existing socket file first when
/// `clean` is set. A bind failure is reported with guidance toward
/// `--clean`, since a stale socket file from a crashed daemon is the most
/// common cause.
pub fn bind(path: &Path, clean: bool) -> Result<UnixListener> {
    if clean && path.exists() {
        if let Err(err) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove stale socket file during --clean");
        }
    }

    UnixListener::bind(path).with_context(|| {
        format!(
            "bind socket at {}; if a stale socket file is present, rerun with --clean",
            path.display()
        )
    })
}
