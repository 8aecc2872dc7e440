use nix::sys::signal::Signal;

/// Small positive integer naming a job for its lifetime.
pub type JobId = usize;

/// How a job left the `Running`/`Stopped` states.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExitInfo {
    Exited(i32),
    Signaled(Signal, bool),
}

impl ExitInfo {
    /// Shell-style status code: the exit code, or 128 + signal number.
    pub fn status_code(&self) -> i32 {
        match self {
            ExitInfo::Exited(code) => *code,
            ExitInfo::Signaled(signal, _) => 128 + *signal as i32,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum JobState {
    Running,
    Stopped(Signal),
    Terminated(ExitInfo),
}

impl JobState {
    pub fn is_running(&self) -> bool {
        matches!(self, JobState::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, JobState::Stopped(_))
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, JobState::Terminated(_))
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            JobState::Running => formatter.write_str("running"),
            JobState::Stopped(_) => formatter.write_str("stopped"),
            JobState::Terminated(ExitInfo::Exited(0)) => formatter.write_str("done"),
            JobState::Terminated(ExitInfo::Exited(code)) => write!(formatter, "exit {code}"),
            JobState::Terminated(ExitInfo::Signaled(signal, _)) => {
                if signal == &Signal::SIGKILL {
                    formatter.write_str("killed")
                } else {
                    formatter.write_str("terminated")
                }
            }
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mode {
    Foreground,
    Background,
}

/// One child state change as reported by `waitpid`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transition {
    Stopped(Signal),
    Terminated(ExitInfo),
    Continued,
}
