use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use tracing::debug;

use super::error::LaunchError;
use super::signal::SignalGuard;
use super::state::{ExitInfo, JobId, JobState, Transition};

/// Translate a `waitpid` report into a job transition.
///
/// Called from the SIGCHLD handler: must not allocate or log.
pub fn decode(status: WaitStatus) -> Option<(Pid, Transition)> {
    match status {
        WaitStatus::Exited(pid, code) => {
            Some((pid, Transition::Terminated(ExitInfo::Exited(code))))
        }
        WaitStatus::Signaled(pid, signal, core_dumped) => Some((
            pid,
            Transition::Terminated(ExitInfo::Signaled(signal, core_dumped)),
        )),
        WaitStatus::Stopped(pid, signal) => Some((pid, Transition::Stopped(signal))),
        #[cfg(any(target_os = "linux", target_os = "android"))]
        WaitStatus::Continued(pid) => Some((pid, Transition::Continued)),
        _ => None,
    }
}

/// Block until `job_id` is no longer running.
///
/// The state check and the sleep happen with the job-control signals
/// deferred, and `sigsuspend` unblocks them atomically, so a SIGCHLD that
/// lands between the check and the sleep still wakes us. Notifications for
/// other jobs wake the loop too but do not end it. A job missing from the
/// table is an error, never a status.
pub fn wait_for_job(guard: &mut SignalGuard, job_id: JobId) -> Result<JobState, LaunchError> {
    debug!("WAIT_JOB_START: waiting for job {}", job_id);
    let mut wakeups = 0usize;
    loop {
        let state = match guard.jobs().get(job_id) {
            Some(job) => job.state,
            None => {
                debug!("WAIT_JOB_GONE: job {} not in table", job_id);
                return Err(LaunchError::UnknownJob(job_id));
            }
        };
        if !state.is_running() {
            debug!(
                "WAIT_JOB_DONE: job {} left running state: {:?} after {} wakeups",
                job_id, state, wakeups
            );
            return Ok(state);
        }
        guard.suspend()?;
        wakeups += 1;
    }
}
