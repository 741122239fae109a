//! The restart queue and the worker that drains it.

use crate::{registry::Registry, spawn};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::{sync::Mutex, time::sleep};
use tracing::{debug, error, info};
use wrangler_wire::LaunchArgs;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// FIFO of launch args awaiting re-spawn. Duplicates are allowed; a worker
/// may be queued for restart more than once.
#[derive(Debug, Default)]
pub struct RestartQueue {
    queue: Mutex<VecDeque<LaunchArgs>>,
}

impl RestartQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, args: LaunchArgs) {
        self.queue.lock().await.push_back(args);
    }

    async fn pop(&self) -> Option<LaunchArgs> {
        self.queue.lock().await.pop_front()
    }
}

/// Poll the restart queue forever, draining it on each wake. A remove is
/// always issued before the re-register, since the registry still holds the
/// terminated worker's monitor under the same identifier.
pub async fn run(registry: Arc<Registry>, queue: Arc<RestartQueue>) {
    loop {
        sleep(POLL_INTERVAL).await;
        while let Some(args) = queue.pop().await {
            debug!(id = %args.id, "restart worker dequeued launch args");
            if let Some(monitor) = registry.remove(&args.id) {
                if monitor.status().is_running() {
                    debug!(id = %args.id, "terminating still-running worker before restart");
                }
            }
            match spawn::register(&registry, args.clone(), Arc::clone(&queue)).await {
                Ok(()) => info!(id = %args.id, "restarted worker"),
                Err(err) => error!(id = %args.id, error = %err, "failed to restart worker"),
            }
        }
    }
}
