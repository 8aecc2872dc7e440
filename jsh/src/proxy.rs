pub mod builtin;

use crate::shell::Shell;
use anyhow::{Result, bail};
use jsh_builtin::ShellProxy;
use jsh_types::{Context, ExitStatus};
use nix::sys::signal::Signal;
use tracing::debug;

impl ShellProxy for Shell {
    fn exit_shell(&mut self) {
        self.exit();
    }

    fn dispatch(&mut self, ctx: &Context, cmd: &str, argv: Vec<String>) -> Result<ExitStatus> {
        debug!("dispatch {} {:?}", cmd, argv);
        match cmd {
            "jobs" => builtin::jobs::execute_jobs(self, ctx, argv),
            "fg" => builtin::jobs::execute_fg(self, ctx, argv),
            "bg" => builtin::jobs::execute_bg(self, ctx, argv),
            _ => bail!("unknown command: {}", cmd),
        }
    }

    fn send_job_signal(&mut self, ctx: &Context, spec: &str, signal: Signal) -> Result<()> {
        builtin::jobs::execute_kill(self, ctx, spec, signal)
    }
}
