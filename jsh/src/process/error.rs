use nix::errno::Errno;
use std::ffi::NulError;

use super::state::JobId;
use thiserror::Error;

/// Failures of a single launch attempt. None of them ends the shell.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("fork failed: {0}")]
    ForkFailed(Errno),

    #[error("too many jobs (limit {0})")]
    TooManyJobs(usize),

    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] NulError),

    #[error("empty command")]
    EmptyCommand,

    #[error("job {0} is not in the job table")]
    UnknownJob(JobId),

    #[error("failed to defer job control signals: {0}")]
    Signal(Errno),
}
