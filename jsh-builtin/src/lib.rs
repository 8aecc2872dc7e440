use anyhow::Result;
use jsh_types::{Context, ExitStatus};
use nix::sys::signal::Signal;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

// Builtin command modules
mod bg;
mod fg;
mod jobs;
pub mod kill;

/// Interface builtin commands use to reach into the shell's job control
/// without depending on the shell crate.
pub trait ShellProxy {
    /// Ask the shell loop to stop after the current command.
    fn exit_shell(&mut self);

    /// Run a job-control command (`jobs`, `fg`, `bg`) inside the shell.
    fn dispatch(&mut self, ctx: &Context, cmd: &str, argv: Vec<String>) -> Result<ExitStatus>;

    /// Deliver `signal` to the target named by `spec`: `%N` for a job, or a pid.
    fn send_job_signal(&mut self, ctx: &Context, spec: &str, signal: Signal) -> Result<()>;
}

/// Type alias for builtin command function signature
pub type BuiltinCommand =
    fn(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus;

/// Global registry of all builtin commands
pub static BUILTIN_COMMAND: Lazy<Mutex<HashMap<&str, BuiltinCommand>>> = Lazy::new(|| {
    let mut builtin = HashMap::new();

    builtin.insert("exit", exit as BuiltinCommand);
    builtin.insert("quit", exit as BuiltinCommand);
    builtin.insert("&", noop as BuiltinCommand);

    // Job control commands
    builtin.insert("jobs", jobs::command as BuiltinCommand);
    builtin.insert("fg", fg::command as BuiltinCommand);
    builtin.insert("bg", bg::command as BuiltinCommand);
    builtin.insert("kill", kill::command as BuiltinCommand);

    Mutex::new(builtin)
});

/// Retrieves a builtin command function by name
/// Returns None if the command is not found
pub fn get_command(name: &str) -> Option<BuiltinCommand> {
    if let Ok(builtin) = BUILTIN_COMMAND.lock() {
        builtin.get(name).copied()
    } else {
        None
    }
}

/// `exit` / `quit`. Background jobs are left running.
pub fn exit(_ctx: &Context, _argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    debug!("Exit command called - initiating normal shell exit");
    proxy.exit_shell();
    ExitStatus::ExitedWith(0)
}

/// A line holding only `&`.
pub fn noop(_ctx: &Context, _argv: Vec<String>, _proxy: &mut dyn ShellProxy) -> ExitStatus {
    ExitStatus::ExitedWith(0)
}
