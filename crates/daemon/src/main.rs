use anyhow::{Context, Result};
use wrangler_daemon::Server;

fn main() -> Result<()> {
    Server::new()
        .context("create server")?
        .start()
        .context("run server")
}
