use super::Shell;
use crate::parser::{ParsedLine, parse_line};
use crate::process::{Mode, Process, SignalGuard, fork};
use anyhow::{Result, anyhow};
use jsh_types::{Context, ExitStatus};
use tracing::debug;

impl Shell {
    /// Run one command line: a builtin, or an external program as a new job.
    pub fn eval_str(&mut self, ctx: &Context, input: &str) -> Result<ExitStatus> {
        let parsed = parse_line(input)?;
        if parsed.is_empty() {
            return Ok(ExitStatus::ExitedWith(0));
        }
        let cmd = input.trim();

        if let Some(builtin) = jsh_builtin::get_command(&parsed.argv[0]) {
            debug!("builtin '{}' argv:{:?}", parsed.argv[0], parsed.argv);
            let status = builtin(ctx, parsed.argv, self);
            self.last_status = status.code();
            return Ok(status);
        }

        self.launch_job(ctx, parsed, cmd)
    }

    fn launch_job(&mut self, ctx: &Context, parsed: ParsedLine, cmd: &str) -> Result<ExitStatus> {
        let mode = if parsed.background {
            Mode::Background
        } else {
            Mode::Foreground
        };
        let process = Process::new(parsed.argv);

        let mut guard = SignalGuard::block()?;
        let job_id = fork::launch(&mut guard, &process, cmd, mode)?;
        let pid = guard
            .jobs()
            .get(job_id)
            .map(|job| job.pid)
            .ok_or_else(|| anyhow!("job {} missing right after launch", job_id))?;

        match mode {
            Mode::Background => {
                drop(guard);
                ctx.write_stdout(&format!("[{}] ({}) {}", job_id, pid, cmd))?;
                self.last_status = 0;
                Ok(ExitStatus::Running(pid))
            }
            Mode::Foreground => self.wait_foreground(ctx, guard, job_id),
        }
    }
}
