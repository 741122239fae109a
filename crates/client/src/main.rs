//! Interactive terminal client for the worker-supervision daemon.
//!
//! Line editing, history, and prompt styling are out of scope here; this
//! reads whole lines from standard input and exits on EOF.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
};
use tracing::{error, info};
use wrangler_wire::{Frame, DETACH_SENTINEL, FRAME_SIZE, SOCKET_FILENAME};

const LOCAL_HELP: &str = "built-in commands:\n\
attach  - connect to the daemon at the well-known socket\n\
help    - show this text\n\
exit    - detach if attached, otherwise quit";

/// Interactive terminal client for the worker-supervision daemon. Takes no
/// flags beyond `--help`/`--version`; it always attaches to the daemon's
/// fixed, well-known socket.
#[derive(Parser)]
#[command(author, version, about = "Interactive terminal client for the worker-supervision daemon.")]
struct Cli;

#[tokio::main]
async fn main() -> Result<()> {
    Cli::parse();
    tracing_subscriber::fmt().with_writer(std::io::stdout).init();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut attached: Option<UnixStream> = None;

    loop {
        let Some(line) = lines.next_line().await.context("read from stdin")? else {
            break;
        };
        let line = line.trim();

        match &mut attached {
            None => match line {
                "attach" => match UnixStream::connect(SOCKET_FILENAME).await {
                    Ok(stream) => {
                        info!("attached");
                        attached = Some(stream);
                    }
                    Err(err) => error!(error = %err, "failed to attach"),
                },
                "help" => println!("{LOCAL_HELP}"),
                "exit" => break,
                "" => {}
                other => println!("not attached; unknown local command \"{other}\" (try `help`)"),
            },
            Some(stream) => {
                if line == "exit" {
                    info!("detached");
                    attached = None;
                    continue;
                }
                match send_command(stream, line).await {
                    Ok(reply) => {
                        if reply == DETACH_SENTINEL {
                            info!("daemon requested detach");
                            attached = None;
                        } else {
                            println!("{reply}");
                        }
                    }
                    Err(err) => {
                        error!(error = %err, "lost connection to daemon");
                        attached = None;
                    }
                }
            }
        }
    }

    Ok(())
}

async fn send_command(stream: &mut UnixStream, line: &str) -> Result<String> {
    let request = Frame::encode(line);
    stream
        .write_all(request.as_bytes())
        .await
        .context("send command frame")?;

    let mut buf = [0u8; FRAME_SIZE];
    stream
        .read_exact(&mut buf)
        .await
        .context("read reply frame")?;
    Ok(Frame::from_bytes(buf).decode())
}
