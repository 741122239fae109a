//! One client session: read a frame, dispatch it, write the reply frame.

use crate::commands::{self, Context};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::UnixStream,
    time::sleep,
};
use tracing::{debug, warn};
use wrangler_wire::{Command, Frame, DETACH_SENTINEL, FRAME_SIZE};

const SESSION_PAUSE: Duration = Duration::from_millis(10);

/// Drive one connected client to completion. Never returns an error;
/// anything that goes wrong on the socket just ends the session, the
/// registry is left untouched.
pub async fn run(mut stream: UnixStream, ctx: Arc<Context>) {
    loop {
        let mut peek_buf = [0u8; 1];
        match stream.peek(&mut peek_buf).await {
            Ok(0) => {
                debug!("client disconnected");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "error polling client socket");
                break;
            }
        }

        let mut buf = [0u8; FRAME_SIZE];
        if let Err(err) = stream.read_exact(&mut buf).await {
            warn!(error = %err, "short read from client, ending session");
            break;
        }

        let payload = Frame::from_bytes(buf).decode();
        let reply = if payload.trim() == "kickme" {
            DETACH_SENTINEL.to_string()
        } else {
            commands::dispatch(Command::parse(&payload), &ctx).await
        };

        let response = Frame::encode(&reply);
        if let Err(err) = stream.write_all(response.as_bytes()).await {
            warn!(error = %err, "short write to client, ending session");
            break;
        }

        if reply == DETACH_SENTINEL {
            debug!("sent detach sentinel, closing session");
            break;
        }

        sleep(SESSION_PAUSE).await;
    }

    let _ = stream.shutdown().await;
}
