use super::Shell;
use crate::process::{ExitInfo, Job, JobId, JobState, SignalGuard, wait_for_job};
use anyhow::Result;
use jsh_types::{Context, ExitStatus};
use tracing::{debug, warn};

/// Line printed when a background job changes state.
pub fn format_report(job: &Job) -> String {
    match job.state {
        JobState::Running => format!("[{}] ({}) Running {}", job.job_id, job.pid, job.cmd),
        JobState::Stopped(signal) => format!(
            "Job [{}] ({}) stopped by signal {}",
            job.job_id,
            job.pid,
            signal.as_str()
        ),
        JobState::Terminated(ExitInfo::Exited(0)) => {
            format!("[{}] ({}) Done {}", job.job_id, job.pid, job.cmd)
        }
        JobState::Terminated(ExitInfo::Exited(code)) => {
            format!("[{}] ({}) Exit {} {}", job.job_id, job.pid, code, job.cmd)
        }
        JobState::Terminated(ExitInfo::Signaled(signal, _)) => format!(
            "Job [{}] ({}) terminated by signal {}",
            job.job_id,
            job.pid,
            signal.as_str()
        ),
    }
}

impl Shell {
    /// Wait for the foreground job, then settle the table and report.
    ///
    /// The job is reported here only when a signal stopped or killed it; a
    /// normal exit is silent. Terminated jobs leave the table.
    pub(crate) fn wait_foreground(
        &mut self,
        ctx: &Context,
        mut guard: SignalGuard,
        job_id: JobId,
    ) -> Result<ExitStatus> {
        let state = wait_for_job(&mut guard, job_id)?;

        let table = guard.jobs();
        table.clear_foreground();
        let mut message = None;
        if let Some(job) = table.get_mut(job_id) {
            job.notified = true;
            if !matches!(state, JobState::Terminated(ExitInfo::Exited(_))) {
                message = Some(format_report(job));
            }
        }
        if state.is_terminated() {
            table.remove(job_id);
        }
        drop(guard);

        let code = match state {
            JobState::Stopped(signal) => 128 + signal as i32,
            JobState::Terminated(info) => info.status_code(),
            JobState::Running => 0,
        };
        debug!("foreground job [{}] ended {:?} status {}", job_id, state, code);
        if let Some(message) = message {
            ctx.write_stdout(&message)?;
        }
        self.last_status = code;
        Ok(ExitStatus::ExitedWith(code))
    }

    /// Print every background job whose state changed since it was last
    /// reported, dropping the finished ones from the table.
    pub fn report_job_status(&mut self, ctx: &Context) -> Result<()> {
        let (reports, unknown) = {
            let mut guard = SignalGuard::block()?;
            let table = guard.jobs();
            (table.collect_reports(), table.unknown_reaps())
        };
        if unknown > self.unknown_reaps_seen {
            warn!("{} reaped children matched no job", unknown);
            self.unknown_reaps_seen = unknown;
        }
        for job in reports {
            debug!("report job [{}] {:?}", job.job_id, job.state);
            ctx.write_stdout(&format_report(&job))?;
        }
        Ok(())
    }
}
