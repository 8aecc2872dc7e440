use nix::errno::Errno;
use nix::unistd::{ForkResult, fork, setpgid};
use tracing::{debug, error};

use super::error::LaunchError;
use super::process::Process;
use super::signal::SignalGuard;
use super::state::{JobId, Mode};

/// Fork `process` as a new job and register it.
///
/// The caller's guard keeps SIGCHLD deferred from before the fork until
/// after the job is in the table, so even a child that exits at once is
/// reaped against a known job.
pub(crate) fn launch(
    guard: &mut SignalGuard,
    process: &Process,
    cmd: &str,
    mode: Mode,
) -> Result<JobId, LaunchError> {
    debug!("🍴 FORK: launching '{}' mode:{:?}", cmd, mode);
    let table = guard.jobs();
    if table.next_job_id().is_none() {
        return Err(LaunchError::TooManyJobs(table.max_jobs()));
    }
    let argv = process.c_argv()?;

    let pid = unsafe { fork() }.map_err(|e| {
        error!("🍴 FORK: fork failed for '{}': {}", cmd, e);
        LaunchError::ForkFailed(e)
    })?;

    match pid {
        ForkResult::Child => Process::exec_child(&argv, guard.prior_mask()),
        ForkResult::Parent { child } => {
            debug!("🍴 FORK: Parent process - child pid: {}", child);
            // Both sides set the group so neither can run ahead of it.
            // EACCES: the child already exec'd; ESRCH: it already exited
            // (still a zombie, reaped once the guard is dropped).
            match setpgid(child, child) {
                Ok(_) | Err(Errno::EACCES) | Err(Errno::ESRCH) => {}
                Err(e) => debug!("🍴 FORK: setpgid({}) in parent failed: {}", child, e),
            }
            let job_id = guard.jobs().insert(child, cmd.to_string(), mode)?;
            debug!("🍴 FORK: registered job [{}] pid:{}", job_id, child);
            Ok(job_id)
        }
    }
}
