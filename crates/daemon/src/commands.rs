//! The command dispatcher: turns a parsed [`Command`] into a reply string.

use crate::{registry::{Registry, TerminalStatus}, restart::RestartQueue, spawn};
use nix::{
    sys::signal::{kill, Signal},
    unistd::Pid,
};
use std::{ffi::CStr, sync::Arc};
use tracing::{debug, warn};
use wrangler_wire::{Command, LaunchArgs};

const HELP_TEXT: &str = "list of all commands:\n\
help                          - show this text\n\
list                          - list all registered workers\n\
status <id>                   - show the status of a worker\n\
register <id> <exe> [cwd]     - register and launch a new worker\n\
remove <id>                   - terminate (if needed) and unregister a worker\n\
autorestart <id> <on|off>     - toggle automatic restart on termination\n\
query <id> <key>              - query one field of a worker's status\n\
restart <id>                  - queue a worker to be terminated and relaunched";

/// Shared daemon state handed to every dispatched command.
pub struct Context {
    pub registry: Arc<Registry>,
    pub queue: Arc<RestartQueue>,
}

/// Dispatch one parsed command against `ctx`, returning the reply payload.
/// Never fails: every branch produces a textual reply, matching the wire
/// protocol's single-channel error reporting (see the daemon's error
/// handling policy).
pub async fn dispatch(cmd: Command, ctx: &Context) -> String {
    match cmd.name.as_str() {
        "help" => command_help(&cmd.args),
        "list" => command_list(&cmd.args, ctx),
        "status" => command_status(&cmd.args, ctx),
        "register" => command_register(&cmd.args, ctx).await,
        "remove" => command_remove(&cmd.args, ctx),
        "autorestart" => command_autorestart(&cmd.args, ctx),
        "query" => command_query(&cmd.args, ctx),
        "restart" => command_restart(&cmd.args, ctx).await,
        _ => "unknown command".to_string(),
    }
}

fn command_help(args: &[String]) -> String {
    if !args.is_empty() {
        return "`help` takes no arguments".to_string();
    }
    HELP_TEXT.to_string()
}

fn command_list(args: &[String], ctx: &Context) -> String {
    if !args.is_empty() {
        return "`list` takes no arguments".to_string();
    }
    let mut out = String::from("list of all workers:");
    for (id, status) in ctx.registry.list() {
        out.push('\n');
        out.push_str(&format!("{id} {}", describe_status(status, true)));
    }
    out
}

fn command_status(args: &[String], ctx: &Context) -> String {
    let Some(id) = args.first().filter(|_| args.len() == 1) else {
        return "`status` takes one argument: `identifier`".to_string();
    };
    match ctx.registry.with(id, |m| m.status()) {
        Some(status) => format!("\"{id}\" {}", describe_status(status, false)),
        None => format!("worker \"{id}\" unknown"),
    }
}

async fn command_register(args: &[String], ctx: &Context) -> String {
    let launch_args = match LaunchArgs::from_register_args(args) {
        Ok(a) => a,
        Err(_) => {
            return "`register` requires an identifier and an executable path".to_string()
        }
    };
    let id = launch_args.id.clone();
    match spawn::register(&ctx.registry, launch_args, Arc::clone(&ctx.queue)).await {
        Ok(()) => format!("registered \"{id}\""),
        Err(err) if err.to_string().contains("already used") => {
            format!("identifier \"{id}\" is already used")
        }
        Err(err) => {
            warn!(id = %id, error = %err, "register failed");
            format!("failed to register \"{id}\": {err}")
        }
    }
}

fn command_remove(args: &[String], ctx: &Context) -> String {
    let Some(id) = args.first().filter(|_| args.len() == 1) else {
        return "`remove` takes one argument: `identifier`".to_string();
    };

    let was_running = ctx
        .registry
        .with(id, |m| m.status().is_running())
        .unwrap_or_default();
    if was_running {
        let terminated = ctx.registry.with(id, |m| terminate(m.pid())).unwrap_or(false);
        if ctx.registry.remove(id).is_none() {
            return format!("worker \"{id}\" not found, nothing removed");
        }
        if terminated {
            return format!(
                "worker \"{id}\" was still running, so it was terminated with SIGTERM/SIGKILL and then removed"
            );
        }
        return format!("worker \"{id}\" removed");
    }

    match ctx.registry.remove(id) {
        Some(_) => format!("worker \"{id}\" removed"),
        None => format!("worker \"{id}\" not found, nothing removed"),
    }
}

fn command_autorestart(args: &[String], ctx: &Context) -> String {
    if args.len() != 2 {
        return "`autorestart` takes arguments `identifier` and `on/off`".to_string();
    }
    let id = &args[0];
    let on = match args[1].as_str() {
        "on" => true,
        "off" => false,
        _ => return "`autorestart` takes arguments `identifier` and `on/off`".to_string(),
    };
    match ctx.registry.with_mut(id, |m| m.set_autorestart(on)) {
        Some(()) => format!(
            "autorestart turned {} for worker \"{id}\"",
            if on { "ON" } else { "OFF" }
        ),
        None => format!("worker \"{id}\" unknown"),
    }
}

fn command_query(args: &[String], ctx: &Context) -> String {
    if args.len() != 2 {
        return "ERROR - invalid arguments".to_string();
    }
    let id = &args[0];
    let key = args[1].as_str();

    let Some(found) = ctx.registry.with(id, |m| {
        match key {
            "pid" => Some(m.pid().to_string()),
            // Always an integer, matching the original: a worker that
            // hasn't terminated yet reports 0, never the word "running".
            "status" => Some(match m.status() {
                TerminalStatus::Running => 0i32.to_string(),
                TerminalStatus::Exited(code) => code.to_string(),
                TerminalStatus::Signalled(sig) => sig.to_string(),
            }),
            "exited" => Some(matches!(m.status(), TerminalStatus::Exited(_)).to_string()),
            "signalled" => Some(matches!(m.status(), TerminalStatus::Signalled(_)).to_string()),
            "autorestart" => Some(m.autorestart().to_string()),
            _ => None,
        }
    }) else {
        return "ERROR - unknown worker".to_string();
    };

    found.unwrap_or_else(|| "ERROR - unknown key".to_string())
}

async fn command_restart(args: &[String], ctx: &Context) -> String {
    let Some(id) = args.first().filter(|_| args.len() == 1) else {
        return "`restart` takes one argument: `identifier`".to_string();
    };
    let Some(launch_args) = ctx.registry.with(id, |m| m.launch_args().clone()) else {
        return format!("worker \"{id}\" unknown");
    };
    ctx.queue.push(launch_args).await;
    format!("queued \"{id}\" to be restarted")
}

fn describe_status(status: TerminalStatus, short: bool) -> String {
    match status {
        TerminalStatus::Running => "(running)".to_string(),
        TerminalStatus::Exited(code) if short => format!("(exited code {code})"),
        TerminalStatus::Exited(code) => format!("exited with code {code}"),
        TerminalStatus::Signalled(sig) => {
            let name = signal_description(sig);
            if short {
                format!("(exited via {name})")
            } else {
                format!("exited via {name}")
            }
        }
    }
}

/// Human-readable description of a signal number, e.g. "Terminated" for
/// SIGTERM. Matches `strsignal(3)`, not the symbolic constant name.
fn signal_description(sig: i32) -> String {
    let ptr = unsafe { libc::strsignal(sig) };
    if ptr.is_null() {
        return sig.to_string();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Send SIGTERM, falling back to SIGKILL if that fails. Returns `true` iff a
/// signal was actually delivered, i.e. the process was still addressable.
fn terminate(pid: u32) -> bool {
    let target = Pid::from_raw(pid as i32);
    if kill(target, Signal::SIGTERM).is_ok() {
        return true;
    }
    debug!(pid, "SIGTERM delivery failed, escalating to SIGKILL");
    kill(target, Signal::SIGKILL).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context {
            registry: Arc::new(Registry::new()),
            queue: Arc::new(RestartQueue::new()),
        }
    }

    #[tokio::test]
    async fn help_rejects_arguments() {
        let ctx = ctx();
        let reply = dispatch(Command::parse("help extra"), &ctx).await;
        assert_eq!(reply, "`help` takes no arguments");
    }

    #[tokio::test]
    async fn unknown_command_name() {
        let ctx = ctx();
        let reply = dispatch(Command::parse("frobnicate"), &ctx).await;
        assert_eq!(reply, "unknown command");
    }

    #[tokio::test]
    async fn status_of_unknown_worker() {
        let ctx = ctx();
        let reply = dispatch(Command::parse("status nope"), &ctx).await;
        assert_eq!(reply, "worker \"nope\" unknown");
    }

    #[tokio::test]
    async fn register_then_status_then_duplicate() {
        let ctx = ctx();
        let id = format!("cmd-test-{}", std::process::id());
        let reply = dispatch(Command::parse(&format!("register {id} /bin/true")), &ctx).await;
        assert_eq!(reply, format!("registered \"{id}\""));

        let reply = dispatch(Command::parse(&format!("register {id} /bin/true")), &ctx).await;
        assert_eq!(reply, format!("identifier \"{id}\" is already used"));

        ctx.registry.remove(&id);
    }

    #[tokio::test]
    async fn remove_unknown_worker() {
        let ctx = ctx();
        let reply = dispatch(Command::parse("remove nope"), &ctx).await;
        assert_eq!(reply, "worker \"nope\" not found, nothing removed");
    }

    #[tokio::test]
    async fn query_rejects_bad_arity() {
        let ctx = ctx();
        let reply = dispatch(Command::parse("query onlyone"), &ctx).await;
        assert_eq!(reply, "ERROR - invalid arguments");
    }

    #[tokio::test]
    async fn query_unknown_worker_and_key() {
        let ctx = ctx();
        let id = format!("cmd-test-query-{}", std::process::id());
        dispatch(Command::parse(&format!("register {id} /bin/true")), &ctx).await;

        let reply = dispatch(Command::parse(&format!("query {id} bogus")), &ctx).await;
        assert_eq!(reply, "ERROR - unknown key");

        let reply = dispatch(Command::parse("query ghost pid"), &ctx).await;
        assert_eq!(reply, "ERROR - unknown worker");

        ctx.registry.remove(&id);
    }

    #[tokio::test]
    async fn query_status_is_integer_while_running() {
        let ctx = ctx();
        let id = format!("cmd-test-status-int-{}", std::process::id());
        dispatch(Command::parse(&format!("register {id} /bin/true")), &ctx).await;

        let reply = dispatch(Command::parse(&format!("query {id} status")), &ctx).await;
        assert_eq!(reply, "0");
        assert!(reply.parse::<i32>().is_ok());

        ctx.registry.remove(&id);
    }

    #[tokio::test]
    async fn autorestart_round_trips() {
        let ctx = ctx();
        let id = format!("cmd-test-autorestart-{}", std::process::id());
        dispatch(Command::parse(&format!("register {id} /bin/true")), &ctx).await;

        let reply = dispatch(Command::parse(&format!("autorestart {id} on")), &ctx).await;
        assert_eq!(reply, format!("autorestart turned ON for worker \"{id}\""));
        assert_eq!(
            dispatch(Command::parse(&format!("query {id} autorestart")), &ctx).await,
            "true"
        );

        dispatch(Command::parse(&format!("autorestart {id} off")), &ctx).await;
        assert_eq!(
            dispatch(Command::parse(&format!("query {id} autorestart")), &ctx).await,
            "false"
        );

        ctx.registry.remove(&id);
    }

    #[tokio::test]
    async fn restart_unknown_worker() {
        let ctx = ctx();
        let reply = dispatch(Command::parse("restart nope"), &ctx).await;
        assert_eq!(reply, "worker \"nope\" unknown");
    }
}
