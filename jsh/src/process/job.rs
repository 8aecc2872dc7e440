use nix::unistd::Pid;

use super::state::{ExitInfo, JobId, JobState, Mode, Transition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub job_id: JobId,
    pub pid: Pid,
    pub pgid: Pid,
    pub cmd: String,
    pub state: JobState,
    pub mode: Mode,
    /// Cleared by every state change, set once the change has been shown to the user.
    pub(crate) notified: bool,
}

impl Job {
    /// Every job leads its own process group, so `pgid == pid`.
    pub fn new(job_id: JobId, pid: Pid, cmd: String, mode: Mode) -> Self {
        Job {
            job_id,
            pid,
            pgid: pid,
            cmd,
            state: JobState::Running,
            mode,
            notified: true,
        }
    }

    pub fn is_foreground(&self) -> bool {
        self.mode == Mode::Foreground
    }

    pub fn is_live(&self) -> bool {
        !self.state.is_terminated()
    }

    /// Apply one wait notification. Returns `false` when the notification
    /// describes no change for this job.
    ///
    /// Runs inside the SIGCHLD handler: must not allocate.
    pub(crate) fn apply(&mut self, transition: Transition) -> bool {
        let next = match (self.state, transition) {
            (JobState::Running, Transition::Stopped(signal)) => JobState::Stopped(signal),
            (JobState::Running | JobState::Stopped(_), Transition::Terminated(info)) => {
                JobState::Terminated(info)
            }
            (JobState::Stopped(_), Transition::Continued) => JobState::Running,
            _ => return false,
        };
        self.state = next;
        self.notified = false;
        true
    }

    /// `Stopped -> Running` on behalf of `fg`/`bg`, before SIGCONT is sent.
    pub(crate) fn resume(&mut self) -> bool {
        if self.state.is_stopped() {
            self.state = JobState::Running;
            self.notified = true;
            true
        } else {
            false
        }
    }

    pub fn exit_info(&self) -> Option<ExitInfo> {
        match self.state {
            JobState::Terminated(info) => Some(info),
            _ => None,
        }
    }
}
