pub mod eval;
pub mod job;

use crate::config::Config;
use crate::process::SignalGuard;
use crate::process::signal::install_signal_handlers;
use anyhow::Result;
use jsh_types::ExitStatus;
use nix::unistd::{Pid, getpgrp, getpid};
use tracing::debug;

pub const APP_NAME: &str = "jsh";

pub struct Shell {
    pub config: Config,
    pub exited: Option<ExitStatus>,
    pub pid: Pid,
    pub pgid: Pid,
    /// Status of the last foreground command or builtin.
    pub last_status: i32,
    unknown_reaps_seen: usize,
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("pid", &self.pid)
            .field("pgid", &self.pgid)
            .field("last_status", &self.last_status)
            .finish()
    }
}

impl Shell {
    pub fn new(config: Config) -> Self {
        Shell {
            config,
            exited: None,
            pid: getpid(),
            pgid: getpgrp(),
            last_status: 0,
            unknown_reaps_seen: 0,
        }
    }

    /// Install the job-control handlers and size the job table.
    pub fn set_signals(&mut self) -> Result<()> {
        install_signal_handlers()?;
        let mut guard = SignalGuard::block()?;
        guard.jobs().set_max_jobs(self.config.max_jobs);
        debug!("job table capacity {}", guard.jobs().max_jobs());
        Ok(())
    }

    pub fn exit(&mut self) {
        debug!("shell exit requested");
        self.exited = Some(ExitStatus::ExitedWith(0));
    }
}
