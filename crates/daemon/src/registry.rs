//! The worker registry: identifier to [`Monitor`] bookkeeping.

use anyhow::{bail, Result};
use getset::{CopyGetters, Getters};
use std::{collections::HashMap, sync::Mutex};
use wrangler_wire::LaunchArgs;

/// How a worker last terminated, as observed by its reaper task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    /// Has not yet been observed to terminate.
    Running,
    /// Exited normally, carrying the exit code.
    Exited(i32),
    /// Killed by a signal, carrying the signal number.
    Signalled(i32),
}

impl TerminalStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, TerminalStatus::Running)
    }
}

/// Bookkeeping for one registered worker.
#[derive(Debug, Getters, CopyGetters)]
pub struct Monitor {
    #[getset(get_copy = "pub")]
    pid: u32,
    #[getset(get_copy = "pub")]
    status: TerminalStatus,
    #[getset(get_copy = "pub")]
    autorestart: bool,
    #[getset(get = "pub")]
    launch_args: LaunchArgs,
}

impl Monitor {
    pub fn new(pid: u32, launch_args: LaunchArgs) -> Self {
        Self {
            pid,
            status: TerminalStatus::Running,
            autorestart: false,
            launch_args,
        }
    }

    pub fn set_exited(&mut self, code: i32) {
        self.status = TerminalStatus::Exited(code);
    }

    pub fn set_signalled(&mut self, signal: i32) {
        self.status = TerminalStatus::Signalled(signal);
    }

    pub fn set_autorestart(&mut self, on: bool) {
        self.autorestart = on;
    }
}

/// The worker registry: a single lock guarding all worker state.
///
/// Every access is taken for the duration of one read or write and never
/// held across an `.await` or a blocking syscall.
#[derive(Debug, Default)]
pub struct Registry {
    workers: Mutex<HashMap<String, Monitor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly spawned worker. Fails if the identifier is already
    /// registered; callers are expected to have checked this already, but
    /// the registry itself remains the source of truth.
    pub fn insert(&self, id: &str, monitor: Monitor) -> Result<()> {
        let mut workers = self.lock();
        if workers.contains_key(id) {
            bail!("identifier \"{id}\" is already used");
        }
        workers.insert(id.to_string(), monitor);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn remove(&self, id: &str) -> Option<Monitor> {
        self.lock().remove(id)
    }

    /// Run `f` with a reference to the named worker's monitor, if present.
    pub fn with<R>(&self, id: &str, f: impl FnOnce(&Monitor) -> R) -> Option<R> {
        self.lock().get(id).map(f)
    }

    /// Run `f` with a mutable reference to the named worker's monitor, if
    /// present.
    pub fn with_mut<R>(&self, id: &str, f: impl FnOnce(&mut Monitor) -> R) -> Option<R> {
        self.lock().get_mut(id).map(f)
    }

    /// A snapshot of `(identifier, status)` pairs, sorted for stable output.
    pub fn list(&self) -> Vec<(String, TerminalStatus)> {
        let workers = self.lock();
        let mut entries: Vec<_> = workers
            .iter()
            .map(|(id, m)| (id.clone(), m.status()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Monitor>> {
        match self.workers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch_args(id: &str) -> LaunchArgs {
        LaunchArgs {
            id: id.to_string(),
            exe: "/bin/true".into(),
            cwd: None,
        }
    }

    #[test]
    fn insert_rejects_duplicate_identifier() {
        let registry = Registry::new();
        registry.insert("w1", Monitor::new(1, launch_args("w1"))).unwrap();
        assert!(registry.insert("w1", Monitor::new(2, launch_args("w1"))).is_err());
    }

    #[test]
    fn exited_and_signalled_are_exclusive() {
        let mut monitor = Monitor::new(1, launch_args("w1"));
        assert!(monitor.status().is_running());
        monitor.set_exited(0);
        assert_eq!(monitor.status(), TerminalStatus::Exited(0));
        monitor.set_signalled(9);
        assert_eq!(monitor.status(), TerminalStatus::Signalled(9));
    }

    #[test]
    fn remove_then_reregister_gets_a_fresh_monitor() {
        let registry = Registry::new();
        registry.insert("w1", Monitor::new(1, launch_args("w1"))).unwrap();
        registry.with_mut("w1", |m| m.set_exited(7));
        let removed = registry.remove("w1").unwrap();
        assert_eq!(removed.status(), TerminalStatus::Exited(7));
        registry.insert("w1", Monitor::new(2, launch_args("w1"))).unwrap();
        assert!(registry.with("w1", |m| m.status().is_running()).unwrap());
    }

    #[test]
    fn list_is_sorted_by_identifier() {
        let registry = Registry::new();
        registry.insert("b", Monitor::new(1, launch_args("b"))).unwrap();
        registry.insert("a", Monitor::new(2, launch_args("a"))).unwrap();
        let ids: Vec<_> = registry.list().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
