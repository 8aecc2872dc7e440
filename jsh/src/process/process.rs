use nix::errno::Errno;
use nix::sys::signal::SigSet;
use nix::unistd::{Pid, execvp, setpgid, write};
use std::ffi::CString;

use super::error::LaunchError;
use super::signal::reset_child_signals;

/// Exit status of a child whose program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit status of a child whose program exists but could not be executed.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Program image and arguments of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub(crate) argv: Vec<String>,
}

impl Process {
    pub fn new(argv: Vec<String>) -> Self {
        Process { argv }
    }

    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    /// C strings are built before fork so bad input fails in the shell, not the child.
    pub(crate) fn c_argv(&self) -> Result<Vec<CString>, LaunchError> {
        if self.argv.is_empty() {
            return Err(LaunchError::EmptyCommand);
        }
        let argv = self
            .argv
            .iter()
            .map(|a| CString::new(a.as_str()))
            .collect::<Result<Vec<CString>, _>>()?;
        Ok(argv)
    }

    /// Child side of fork: own process group, default signal handling, then
    /// exec. Never returns; on failure only the child exits.
    pub(crate) fn exec_child(argv: &[CString], prior_mask: &SigSet) -> ! {
        let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
        reset_child_signals(prior_mask);

        let err = match execvp(&argv[0], argv) {
            Ok(never) => match never {},
            Err(err) => err,
        };
        let (reason, status): (&[u8], i32) = match err {
            Errno::EACCES | Errno::EISDIR | Errno::ENOEXEC => {
                (b": Permission denied\n", EXIT_NOT_EXECUTABLE)
            }
            _ => (b": Command not found\n", EXIT_NOT_FOUND),
        };
        let _ = write(libc::STDOUT_FILENO, argv[0].as_bytes());
        let _ = write(libc::STDOUT_FILENO, reason);
        // SAFETY: leave without running the parent's atexit handlers or
        // flushing stdio buffers copied from it.
        unsafe { libc::_exit(status) }
    }
}
