//! Configuration related structures
use clap::Parser;
use getset::{CopyGetters, Getters};
use std::path::PathBuf;

#[derive(CopyGetters, Debug, Getters, Parser)]
#[command(author, version, about = "A headless worker-supervision daemon.")]
pub struct Config {
    /// Remove an existing socket file at startup instead of failing to bind.
    #[get_copy = "pub"]
    #[arg(long)]
    clean: bool,

    /// Change to this directory before opening the daemon's own log file.
    /// Relative paths are resolved against the current working directory.
    #[get = "pub"]
    #[arg(long, value_name = "PATH")]
    dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::parse()
    }
}
