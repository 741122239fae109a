//! Shared wire types for the worker-supervision daemon and its client.

use anyhow::{bail, Result};
use std::path::PathBuf;

/// Size in bytes of every frame exchanged between client and daemon.
pub const FRAME_SIZE: usize = 1024;

/// Fixed path of the daemon's local stream socket.
pub const SOCKET_FILENAME: &str = "/tmp/.sohs_socket_1_0";

/// Reserved response payload telling the client to disconnect.
pub const DETACH_SENTINEL: &str = "_do_detach_now";

/// One fixed-size frame as exchanged over the socket.
///
/// Encoding copies the payload bytes starting at offset 0 and truncates to
/// [`FRAME_SIZE`]; the remainder of the buffer is left zeroed. Decoding reads
/// up to the first NUL byte (or the full buffer if none is present).
#[derive(Clone, Copy)]
pub struct Frame([u8; FRAME_SIZE]);

impl Frame {
    /// Encode `payload` into a frame, silently truncating to [`FRAME_SIZE`].
    pub fn encode(payload: &str) -> Self {
        let mut buf = [0u8; FRAME_SIZE];
        let bytes = payload.as_bytes();
        let len = bytes.len().min(FRAME_SIZE);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self(buf)
    }

    /// Decode the frame back into a string, stopping at the first NUL.
    pub fn decode(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(FRAME_SIZE);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.0
    }

    pub fn from_bytes(bytes: [u8; FRAME_SIZE]) -> Self {
        Self(bytes)
    }
}

/// A parsed command line: the command name and its whitespace-separated
/// arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Parse a decoded frame payload into a command name and argument list.
    ///
    /// The payload is trimmed first; an empty result yields an empty command
    /// name, which the dispatcher treats as unknown.
    pub fn parse(payload: &str) -> Self {
        let mut tokens = payload.trim().split_whitespace();
        let name = tokens.next().unwrap_or_default().to_string();
        let args = tokens.map(str::to_string).collect();
        Self { name, args }
    }
}

/// The launch arguments for a worker, as supplied to `register` and retained
/// for `restart`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchArgs {
    pub id: String,
    pub exe: PathBuf,
    pub cwd: Option<PathBuf>,
}

impl LaunchArgs {
    /// Build launch args from the argument list of a `register` command.
    /// Tokens beyond `id` and `exe` are taken as the working directory;
    /// anything past that is accepted but ignored, matching the original
    /// server which never forwards extra arguments to the spawned child.
    pub fn from_register_args(args: &[String]) -> Result<Self> {
        if args.len() < 2 {
            bail!("register requires at least an identifier and an executable path");
        }
        Ok(Self {
            id: args[0].clone(),
            exe: PathBuf::from(&args[1]),
            cwd: args.get(2).map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_short_payload() {
        let frame = Frame::encode("status w1");
        assert_eq!(frame.as_bytes().len(), FRAME_SIZE);
        assert_eq!(frame.decode(), "status w1");
    }

    #[test]
    fn frame_truncates_long_payload() {
        let long = "a".repeat(FRAME_SIZE + 50);
        let frame = Frame::encode(&long);
        assert_eq!(frame.decode(), "a".repeat(FRAME_SIZE));
    }

    #[test]
    fn frame_decodes_empty_as_empty_string() {
        let frame = Frame::encode("");
        assert_eq!(frame.decode(), "");
    }

    #[test]
    fn command_parse_splits_name_and_args() {
        let cmd = Command::parse("  register w1 /bin/true  \n");
        assert_eq!(cmd.name, "register");
        assert_eq!(cmd.args, vec!["w1", "/bin/true"]);
    }

    #[test]
    fn command_parse_empty_is_unknown() {
        let cmd = Command::parse("   ");
        assert_eq!(cmd.name, "");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn launch_args_requires_two_tokens() {
        assert!(LaunchArgs::from_register_args(&["only-id".to_string()]).is_err());
    }

    #[test]
    fn launch_args_picks_up_optional_cwd() {
        let args = LaunchArgs::from_register_args(&[
            "w1".to_string(),
            "/bin/true".to_string(),
            "/tmp".to_string(),
        ])
        .unwrap();
        assert_eq!(args.id, "w1");
        assert_eq!(args.exe, PathBuf::from("/bin/true"));
        assert_eq!(args.cwd, Some(PathBuf::from("/tmp")));
    }
}
