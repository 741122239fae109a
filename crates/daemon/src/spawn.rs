//! Spawning a worker child process and starting its reaper.

use crate::{
    reaper,
    registry::{Monitor, Registry},
    restart::RestartQueue,
};
use anyhow::{Context, Result};
use std::{fs, os::unix::fs::PermissionsExt as _, path::PathBuf, process::Stdio, sync::Arc};
use tokio::process::Command;
use tracing::debug;
use wrangler_wire::LaunchArgs;

/// Exit code a worker reports when it could not `chdir` into its configured
/// working directory before exec.
pub const CHDIR_FAILURE_EXIT_CODE: i32 = 55;

/// Directory each worker's stdout/stderr is redirected into.
const LOG_DIR: &str = "/tmp/ServerOrganizer";

/// Spawn a worker per `args`, insert it into `registry`, and start its
/// reaper. Returns an error (without mutating the registry) if the
/// identifier is already registered or the process cannot be started.
pub async fn register(
    registry: &Arc<Registry>,
    args: LaunchArgs,
    queue: Arc<RestartQueue>,
) -> Result<()> {
    if registry.contains(&args.id) {
        anyhow::bail!("identifier \"{}\" is already used", args.id);
    }

    let log_path = per_worker_log_path(&args.id).context("prepare worker log file")?;
    let log_file = fs::File::create(&log_path).context("create worker log file")?;
    let mut perms = log_file.metadata()?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(&log_path, perms)?;
    let stderr_file = log_file.try_clone().context("clone worker log file handle")?;

    let mut command = Command::new(&args.exe);
    // Match the original server: only the executable path itself is passed
    // as argv[0], no further arguments are forwarded from `register`.
    command
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(stderr_file))
        .stdin(Stdio::null());
    if let Some(cwd) = args.cwd.clone() {
        // Chdir inside the child, after fork and before exec, so a failure
        // there surfaces as the child's own exit status rather than as a
        // synchronous spawn error here. The reaper then observes it like any
        // other termination.
        unsafe {
            command.pre_exec(move || {
                if std::env::set_current_dir(&cwd).is_err() {
                    std::process::exit(CHDIR_FAILURE_EXIT_CODE);
                }
                Ok(())
            });
        }
    }

    debug!(id = %args.id, exe = %args.exe.display(), "spawning worker");
    let mut child = command.spawn().context("spawn worker process")?;
    let pid = child.id().context("spawned child has no pid")?;

    registry
        .insert(&args.id, Monitor::new(pid, args.clone()))
        .context("insert worker into registry")?;

    reaper::spawn(Arc::clone(registry), queue, args.id.clone(), child);

    Ok(())
}

fn per_worker_log_path(id: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(LOG_DIR);
    if !dir.exists() {
        fs::create_dir(&dir).context("create worker log directory")?;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
    }
    let path = dir.join(format!("{id}.log"));
    // The original unlinks only when the file is *absent*, which is
    // backwards; a stale log from a previous run with the same identifier
    // must be removed before a fresh one is created.
    if path.exists() {
        fs::remove_file(&path).context("remove stale worker log file")?;
    }
    Ok(path)
}
