use nix::unistd::Pid;
use tracing::debug;

use super::error::LaunchError;
use super::job::Job;
use super::state::{JobId, Mode, Transition};

pub const DEFAULT_MAX_JOBS: usize = 16;
pub const MAX_JOBS_LIMIT: usize = 64;

/// Result of feeding one `waitpid` report into the table.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Recorded {
    Applied(JobId),
    Unchanged(JobId),
    UnknownPid,
}

/// All jobs the shell is tracking.
///
/// The shell loop reaches the process-wide table only through a
/// [`SignalGuard`](super::signal::SignalGuard); the SIGCHLD handler calls
/// [`JobTable::record`], which never allocates.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    foreground: Option<JobId>,
    max_jobs: usize,
    unknown_reaps: usize,
}

impl JobTable {
    pub const fn new() -> Self {
        JobTable {
            jobs: Vec::new(),
            foreground: None,
            max_jobs: DEFAULT_MAX_JOBS,
            unknown_reaps: 0,
        }
    }

    pub fn set_max_jobs(&mut self, max_jobs: usize) {
        self.max_jobs = max_jobs.clamp(1, MAX_JOBS_LIMIT);
        let additional = self.max_jobs.saturating_sub(self.jobs.len());
        self.jobs.reserve(additional);
    }

    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Smallest id not held by any job, if the table has room.
    pub fn next_job_id(&self) -> Option<JobId> {
        if self.jobs.len() >= self.max_jobs {
            return None;
        }
        (1..=self.max_jobs).find(|id| self.jobs.iter().all(|job| job.job_id != *id))
    }

    pub fn insert(&mut self, pid: Pid, cmd: String, mode: Mode) -> Result<JobId, LaunchError> {
        let job_id = self
            .next_job_id()
            .ok_or(LaunchError::TooManyJobs(self.max_jobs))?;
        debug_assert!(
            self.find_live_by_pid(pid).is_none(),
            "pid {pid} already tracked by a live job"
        );
        debug!("job table insert [{}] pid:{} mode:{:?}", job_id, pid, mode);
        self.jobs.push(Job::new(job_id, pid, cmd, mode));
        if mode == Mode::Foreground {
            self.set_foreground(job_id);
        }
        Ok(job_id)
    }

    pub fn get(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.job_id == job_id)
    }

    pub fn get_mut(&mut self, job_id: JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.job_id == job_id)
    }

    /// Live job owning `pid`. A terminated entry may still hold a pid the
    /// kernel has since handed to a newer child, so it is skipped.
    pub fn find_live_by_pid(&self, pid: Pid) -> Option<&Job> {
        self.jobs.iter().find(|job| job.pid == pid && job.is_live())
    }

    /// Most recently launched live job, then the one before it.
    pub fn current(&self) -> Option<&Job> {
        self.jobs.iter().rev().find(|job| job.is_live())
    }

    pub fn previous(&self) -> Option<&Job> {
        self.jobs.iter().rev().filter(|job| job.is_live()).nth(1)
    }

    pub fn foreground(&self) -> Option<&Job> {
        self.foreground.and_then(|job_id| self.get(job_id))
    }

    /// Process group of the live foreground job. Read by the SIGINT/SIGTSTP handler.
    pub fn foreground_pgid(&self) -> Option<Pid> {
        self.foreground()
            .filter(|job| job.is_live())
            .map(|job| job.pgid)
    }

    /// Make `job_id` the foreground job, demoting any previous one.
    pub fn set_foreground(&mut self, job_id: JobId) -> bool {
        if self.get(job_id).is_none() {
            return false;
        }
        self.clear_foreground();
        if let Some(job) = self.get_mut(job_id) {
            job.mode = Mode::Foreground;
        }
        self.foreground = Some(job_id);
        true
    }

    pub fn clear_foreground(&mut self) {
        if let Some(job_id) = self.foreground.take()
            && let Some(job) = self.get_mut(job_id)
        {
            job.mode = Mode::Background;
        }
    }

    /// Apply a decoded `waitpid` report.
    ///
    /// Runs inside the SIGCHLD handler: must not allocate.
    pub fn record(&mut self, pid: Pid, transition: Transition) -> Recorded {
        match self
            .jobs
            .iter_mut()
            .find(|job| job.pid == pid && job.is_live())
        {
            Some(job) => {
                if job.apply(transition) {
                    Recorded::Applied(job.job_id)
                } else {
                    Recorded::Unchanged(job.job_id)
                }
            }
            None => {
                self.unknown_reaps += 1;
                Recorded::UnknownPid
            }
        }
    }

    /// Children reaped that matched no job. Stays zero as long as every
    /// child is registered before its SIGCHLD can be handled.
    pub fn unknown_reaps(&self) -> usize {
        self.unknown_reaps
    }

    /// Remove a job whose termination has been observed. Live jobs stay.
    pub fn remove(&mut self, job_id: JobId) -> Option<Job> {
        let index = self
            .jobs
            .iter()
            .position(|job| job.job_id == job_id && !job.is_live())?;
        if self.foreground == Some(job_id) {
            self.foreground = None;
        }
        debug!("job table remove [{}]", job_id);
        Some(self.jobs.remove(index))
    }

    /// Background status check: hand back every background job with an
    /// unreported state change. Terminated ones leave the table.
    pub fn collect_reports(&mut self) -> Vec<Job> {
        let mut reports = Vec::new();
        let foreground = self.foreground;
        for job in self.jobs.iter_mut() {
            if Some(job.job_id) == foreground || job.notified {
                continue;
            }
            job.notified = true;
            reports.push(job.clone());
        }
        self.jobs
            .retain(|job| job.is_live() || Some(job.job_id) == foreground);
        reports
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}
