use anyhow::{Context as _, Result};
use nix::errno::Errno;
use nix::sys::signal::{
    SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal, kill, killpg, sigaction,
    sigprocmask,
};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

use super::error::LaunchError;
use super::table::{JobTable, Recorded};
use super::wait::decode;

/// Signals that mutate or read the job table asynchronously.
pub const DEFERRED_SIGNALS: [Signal; 3] = [Signal::SIGCHLD, Signal::SIGINT, Signal::SIGTSTP];

/// Signals the shell itself ignores. Children get the defaults back.
const IGNORED_SIGNALS: [Signal; 3] = [Signal::SIGQUIT, Signal::SIGTTIN, Signal::SIGTTOU];

struct JobTableCell(UnsafeCell<JobTable>);

// SAFETY: the shell is single threaded. The loop reaches the table only
// through a `SignalGuard`, which blocks every signal in `DEFERRED_SIGNALS`,
// and each handler runs with that same set in its `sa_mask`, so at most one
// context touches the table at a time.
unsafe impl Sync for JobTableCell {}

static JOB_TABLE: JobTableCell = JobTableCell(UnsafeCell::new(JobTable::new()));
static GUARD_HELD: AtomicBool = AtomicBool::new(false);

pub fn deferred_set() -> SigSet {
    let mut set = SigSet::empty();
    for signal in DEFERRED_SIGNALS {
        set.add(signal);
    }
    set
}

/// Scoped deferral of the job-control signals.
///
/// Blocks [`DEFERRED_SIGNALS`] on creation and restores the previous mask on
/// drop. While alive it is the only way for the shell loop to reach the job
/// table. Only one guard exists at a time.
pub struct SignalGuard {
    prev: SigSet,
    _not_send: PhantomData<*const ()>,
}

impl SignalGuard {
    pub fn block() -> Result<Self, LaunchError> {
        if GUARD_HELD
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LaunchError::Signal(Errno::EDEADLK));
        }
        let mut prev = SigSet::empty();
        if let Err(e) = sigprocmask(
            SigmaskHow::SIG_BLOCK,
            Some(&deferred_set()),
            Some(&mut prev),
        ) {
            GUARD_HELD.store(false, Ordering::SeqCst);
            return Err(LaunchError::Signal(e));
        }
        Ok(SignalGuard {
            prev,
            _not_send: PhantomData,
        })
    }

    /// Mask that was in effect before the guard was taken. Children restore it before exec.
    pub fn prior_mask(&self) -> &SigSet {
        &self.prev
    }

    pub fn jobs(&mut self) -> &mut JobTable {
        // SAFETY: see `JobTableCell`; `&mut self` keeps the borrow from
        // outliving the guard or overlapping `suspend`.
        unsafe { &mut *JOB_TABLE.0.get() }
    }

    /// Atomically unblock the deferred signals and sleep until a handler
    /// has run, then block them again.
    pub fn suspend(&mut self) -> Result<(), LaunchError> {
        let mut mask = self.prev;
        for signal in DEFERRED_SIGNALS {
            mask.remove(signal);
        }
        let mask: &libc::sigset_t = mask.as_ref();
        // SAFETY: plain libc call with a valid sigset.
        let ret = unsafe { libc::sigsuspend(mask) };
        match Errno::result(ret) {
            Err(Errno::EINTR) => Ok(()),
            Err(e) => Err(LaunchError::Signal(e)),
            Ok(_) => Ok(()),
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        if let Err(e) = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.prev), None) {
            error!("failed to restore signal mask: {}", e);
        }
        GUARD_HELD.store(false, Ordering::SeqCst);
    }
}

/// Keeps the interrupted code's errno intact across a handler.
struct ErrnoGuard(i32);

impl ErrnoGuard {
    fn save() -> Self {
        ErrnoGuard(Errno::last() as i32)
    }
}

impl Drop for ErrnoGuard {
    fn drop(&mut self) {
        // SAFETY: errno location of the current thread is always valid.
        unsafe { *errno_location() = self.0 };
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__errno_location() }
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
unsafe fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__error() }
}

/// Async-signal-safe write to stderr.
fn sio_puts(msg: &[u8]) {
    let _ = nix::unistd::write(libc::STDERR_FILENO, msg);
}

extern "C" fn handle_sigchld(_: libc::c_int) {
    let _errno = ErrnoGuard::save();
    // SAFETY: SIGCHLD is only delivered while the loop holds no guard, and
    // the other job-control handlers are masked while this one runs.
    let table = unsafe { &mut *JOB_TABLE.0.get() };
    reap_children(table);
}

/// Drain every child with a pending state change. One SIGCHLD may stand
/// for several children, so stopping after the first would lose reaps.
fn reap_children(table: &mut JobTable) {
    let options = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
    loop {
        match waitpid(Pid::from_raw(-1), Some(options)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => {
                if let Some((pid, transition)) = decode(status)
                    && table.record(pid, transition) == Recorded::UnknownPid
                {
                    sio_puts(b"jsh: reaped a child that belongs to no job\n");
                }
            }
            Err(Errno::ECHILD) => break,
            Err(Errno::EINTR) => continue,
            Err(_) => {
                sio_puts(b"jsh: waitpid failed while reaping children\n");
                // SAFETY: terminating without unwinding out of a handler.
                unsafe { libc::_exit(1) };
            }
        }
    }
}

/// SIGINT / SIGTSTP typed at the terminal go to the foreground job's group only.
extern "C" fn forward_to_foreground(signum: libc::c_int) {
    let _errno = ErrnoGuard::save();
    // SAFETY: same exclusion as `handle_sigchld`; this handler only reads.
    let table = unsafe { &*JOB_TABLE.0.get() };
    if let Some(pgid) = table.foreground_pgid()
        && let Ok(signal) = Signal::try_from(signum)
    {
        let _ = killpg(pgid, signal);
    }
}

pub(crate) fn install_signal_handlers() -> Result<()> {
    tracing::info!("🔧 SIGNAL: Installing job control handlers");
    let mask = deferred_set();
    let sigchld = SigAction::new(
        SigHandler::Handler(handle_sigchld),
        SaFlags::SA_RESTART,
        mask,
    );
    let forward = SigAction::new(
        SigHandler::Handler(forward_to_foreground),
        SaFlags::SA_RESTART,
        mask,
    );
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    unsafe {
        sigaction(Signal::SIGCHLD, &sigchld).context("failed to set SIGCHLD handler")?;
        sigaction(Signal::SIGINT, &forward).context("failed to set SIGINT handler")?;
        sigaction(Signal::SIGTSTP, &forward).context("failed to set SIGTSTP handler")?;
        for signal in IGNORED_SIGNALS {
            sigaction(signal, &ignore)
                .with_context(|| format!("failed to ignore {}", signal.as_str()))?;
        }
    }
    debug!("Signal handlers setup completed");
    Ok(())
}

/// Put the job-control signals, and SIGPIPE which the Rust runtime
/// ignores, back to their defaults. Called in the child between fork and exec.
pub(crate) fn reset_child_signals(prior_mask: &SigSet) {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for signal in DEFERRED_SIGNALS
        .into_iter()
        .chain(IGNORED_SIGNALS)
        .chain([Signal::SIGPIPE])
    {
        unsafe {
            let _ = sigaction(signal, &action);
        }
    }
    let _ = sigprocmask(SigmaskHow::SIG_SETMASK, Some(prior_mask), None);
}

/// Send `signal` to a whole job process group.
pub(crate) fn send_signal(pgid: Pid, signal: Signal) -> Result<()> {
    debug!("📡 SIGNAL: Sending signal {:?} to group {}", signal, pgid);
    match killpg(pgid, signal) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!(
                "📡 SIGNAL: Failed to send signal {:?} to group {}: {}",
                signal, pgid, e
            );
            Err(e.into())
        }
    }
}

/// Send `signal` to a single process that is not one of our jobs.
pub(crate) fn send_signal_to_pid(pid: Pid, signal: Signal) -> Result<()> {
    debug!("📡 SIGNAL: Sending signal {:?} to pid {}", signal, pid);
    kill(pid, signal).with_context(|| format!("({}) - {}", pid, signal.as_str()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = tracing_subscriber::fmt::try_init();
    }

    fn current_mask() -> SigSet {
        let mut mask = SigSet::empty();
        sigprocmask(SigmaskHow::SIG_BLOCK, None, Some(&mut mask)).unwrap();
        mask
    }

    #[test]
    fn guard_blocks_and_restores_mask() {
        init();
        assert!(!current_mask().contains(Signal::SIGCHLD));
        {
            let mut guard = SignalGuard::block().unwrap();
            let mask = current_mask();
            for signal in DEFERRED_SIGNALS {
                assert!(mask.contains(signal), "{signal:?} not deferred");
            }
            assert!(!guard.prior_mask().contains(Signal::SIGCHLD));

            // only one guard at a time
            assert!(matches!(
                SignalGuard::block(),
                Err(LaunchError::Signal(Errno::EDEADLK))
            ));

            assert!(guard.jobs().foreground().is_none());
        }
        assert!(!current_mask().contains(Signal::SIGCHLD));
        let guard = SignalGuard::block().unwrap();
        drop(guard);
    }

    #[test]
    fn deferred_set_contains_job_control_signals() {
        let set = deferred_set();
        assert!(set.contains(Signal::SIGCHLD));
        assert!(set.contains(Signal::SIGINT));
        assert!(set.contains(Signal::SIGTSTP));
        assert!(!set.contains(Signal::SIGQUIT));
    }

    #[test]
    fn reap_children_without_children_returns() {
        init();
        let mut table = JobTable::new();
        reap_children(&mut table);
        assert_eq!(table.unknown_reaps(), 0);
    }
}
