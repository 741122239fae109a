#![deny(missing_docs)]
//! The daemon process: startup, signal handling, and the accept loop.

use crate::{commands::Context, config::Config, listener, logging, restart, session};
use anyhow::{Context as _, Result};
use clap::Parser as _;
use std::{path::Path, sync::Arc};
use tokio::{
    runtime::Builder,
    signal::unix::{signal, SignalKind},
    sync::oneshot,
};
use tracing::{debug, info};
use wrangler_wire::SOCKET_FILENAME;

/// The main server structure.
pub struct Server {
    config: Config,
}

impl Server {
    /// Create a new `Server` instance by parsing the command line.
    pub fn new() -> Result<Self> {
        Ok(Self {
            config: Config::parse(),
        })
    }

    /// Start the `Server` instance and run it to completion.
    pub fn start(self) -> Result<()> {
        if let Some(dir) = self.config.dir() {
            std::env::set_current_dir(dir)
                .with_context(|| format!("change directory to {}", dir.display()))?;
        }

        let _guard = logging::init().context("initialize logging")?;

        let rt = Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("build tokio runtime")?;
        rt.block_on(self.run())
    }

    async fn run(self) -> Result<()> {
        let socket_path = Path::new(SOCKET_FILENAME);
        let listener = listener::bind(socket_path, self.config.clean())?;
        info!(socket = %socket_path.display(), "bound worker-supervision socket");

        let ctx = Arc::new(Context {
            registry: Default::default(),
            queue: Default::default(),
        });

        tokio::spawn(restart::run(Arc::clone(&ctx.registry), Arc::clone(&ctx.queue)));

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        tokio::spawn(signal_handler(socket_path.to_path_buf(), shutdown_tx));

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("shutting down accept loop");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let ctx = Arc::clone(&ctx);
                            tokio::spawn(async move { session::run(stream, ctx).await });
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to accept client connection");
                        }
                    }
                }
            }
        }
    }
}

async fn signal_handler(socket_path: std::path::PathBuf, shutdown_tx: oneshot::Sender<()>) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    let _ = shutdown_tx.send(());
    if let Err(err) = tokio::fs::remove_file(&socket_path).await {
        tracing::warn!(path = %socket_path.display(), error = %err, "failed to remove socket file on shutdown");
    }
    Ok(())
}
