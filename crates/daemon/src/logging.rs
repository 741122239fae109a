//! The daemon's own structured log, written to a file under `logs/`.

use anyhow::{Context, Result};
use std::{
    fs,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Create `logs/` in the current directory and attach a non-blocking file
/// writer to it, named after the daemon's start time. The returned guard
/// must be kept alive for the duration of the process or buffered log lines
/// are dropped on exit.
pub fn init() -> Result<WorkerGuard> {
    let logs_dir = Path::new("logs");
    fs::create_dir_all(logs_dir).context("create logs directory")?;

    let started_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let file_name = format!("{started_at}.log");

    let file = fs::File::create(logs_dir.join(&file_name)).context("create daemon log file")?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()
        .context("install tracing subscriber")?;

    Ok(guard)
}
