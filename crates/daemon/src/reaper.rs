//! Per-worker reaper: waits for one child to terminate and records the
//! outcome in its [`Monitor`](crate::registry::Monitor).

use crate::{registry::Registry, restart::RestartQueue};
use std::{os::unix::process::ExitStatusExt, sync::Arc};
use tokio::process::Child;
use tracing::{debug, error, warn};

/// Spawn the reaper task for a just-registered worker. The task owns the
/// `Child` handle; the registry is only ever referenced by identifier, so
/// the reaper never holds a dangling pointer into it.
pub fn spawn(registry: Arc<Registry>, queue: Arc<RestartQueue>, id: String, mut child: Child) {
    tokio::spawn(async move {
        let wait_result = child.wait().await;
        let status = match wait_result {
            Ok(status) => status,
            Err(err) => {
                error!(id = %id, error = %err, "failed waiting on worker");
                return;
            }
        };

        let autorestart = registry
            .with_mut(&id, |monitor| {
                if let Some(signal) = status.signal() {
                    monitor.set_signalled(signal);
                    debug!(id = %id, signal, "worker terminated by signal");
                } else {
                    let code = status.code().unwrap_or(0);
                    monitor.set_exited(code);
                    debug!(id = %id, code, "worker exited");
                }
                monitor.autorestart()
            })
            .unwrap_or_else(|| {
                warn!(id = %id, "worker exited but was no longer registered");
                false
            });

        if autorestart {
            if let Some(launch_args) = registry.with(&id, |m| m.launch_args().clone()) {
                debug!(id = %id, "queuing worker for restart");
                queue.push(launch_args).await;
            }
        }
    });
}
