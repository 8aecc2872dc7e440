//! Job control command handlers (jobs, fg, bg, kill).

use crate::process::signal::{send_signal, send_signal_to_pid};
use crate::process::{JobId, JobTable, SignalGuard};
use crate::shell::Shell;
use anyhow::{Result, anyhow, bail};
use jsh_types::{Context, ExitStatus};
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tabled::{Table, Tabled};
use tracing::{debug, warn};

#[derive(Tabled)]
struct JobRow {
    job: usize,
    pid: i32,
    state: String,
    command: String,
}

/// Parse job specification (e.g., "%1", "1", "%+", "%-").
///
/// An empty spec means the current job. Only live jobs match.
pub fn parse_job_spec(spec: &str, table: &JobTable) -> Option<JobId> {
    let spec = spec.trim();
    match spec {
        "" | "%" | "%%" | "%+" | "+" => return table.current().map(|job| job.job_id),
        "%-" | "-" => return table.previous().map(|job| job.job_id),
        _ => {}
    }
    let job_num = spec.strip_prefix('%').unwrap_or(spec).parse::<JobId>().ok()?;
    table
        .get(job_num)
        .filter(|job| job.is_live())
        .map(|job| job.job_id)
}

fn no_such_job(spec: &str) -> anyhow::Error {
    if spec.is_empty() {
        anyhow!("no current job")
    } else {
        anyhow!("{}: no such job", spec)
    }
}

/// Execute the `jobs` builtin command.
///
/// Reports finished jobs first so the listing only shows live ones.
pub fn execute_jobs(shell: &mut Shell, ctx: &Context, _argv: Vec<String>) -> Result<ExitStatus> {
    shell.report_job_status(ctx)?;

    let rows: Vec<JobRow> = {
        let mut guard = SignalGuard::block()?;
        guard
            .jobs()
            .iter()
            .filter(|job| job.is_live())
            .map(|job| JobRow {
                job: job.job_id,
                pid: job.pid.as_raw(),
                state: job.state.to_string(),
                command: job.cmd.clone(),
            })
            .collect()
    };

    if rows.is_empty() {
        ctx.write_stdout("jobs: there are no jobs")?;
    } else {
        let table = Table::new(rows).to_string();
        ctx.write_stdout(table.as_str())?;
    }
    Ok(ExitStatus::ExitedWith(0))
}

/// Execute the `fg` builtin command.
///
/// Announces the job, then marks it foreground, resumes it if stopped, and
/// waits for it. Nothing in the table changes until the announcement is out.
pub fn execute_fg(shell: &mut Shell, ctx: &Context, argv: Vec<String>) -> Result<ExitStatus> {
    let spec = argv.get(1).map(|s| s.as_str()).unwrap_or("");
    debug!("FG_CMD_SPEC: Job specification: '{}'", spec);

    let mut guard = SignalGuard::block()?;
    let table = guard.jobs();
    let job_id = parse_job_spec(spec, table).ok_or_else(|| no_such_job(spec))?;
    let (pgid, cmd) = table
        .get(job_id)
        .map(|job| (job.pgid, job.cmd.clone()))
        .ok_or_else(|| no_such_job(spec))?;
    ctx.write_stdout(&format!("jsh: job {} '{}' to foreground", job_id, cmd))?;

    table.set_foreground(job_id);
    let was_stopped = table.get_mut(job_id).is_some_and(|job| job.resume());
    debug!(
        "FG_CMD_SELECTED: job {} pgid:{} was_stopped:{}",
        job_id, pgid, was_stopped
    );
    if let Err(err) = send_signal(pgid, Signal::SIGCONT) {
        // the group is already gone; its SIGCHLD ends the wait
        warn!("FG_CMD_SIGCONT_ERROR: job {}: {}", job_id, err);
    }
    shell.wait_foreground(ctx, guard, job_id)
}

/// Execute the `bg` builtin command.
///
/// Resumes a stopped job in the background. Without a spec the most
/// recently stopped job is chosen.
pub fn execute_bg(_shell: &mut Shell, ctx: &Context, argv: Vec<String>) -> Result<ExitStatus> {
    let spec = argv.get(1).map(|s| s.as_str()).unwrap_or("");
    debug!("BG_CMD_SPEC: Job specification: '{}'", spec);

    let mut guard = SignalGuard::block()?;
    let table = guard.jobs();
    let job_id = if spec.is_empty() {
        table
            .iter()
            .rev()
            .find(|job| job.state.is_stopped())
            .map(|job| job.job_id)
            .ok_or_else(|| anyhow!("there are no stopped jobs"))?
    } else {
        parse_job_spec(spec, table).ok_or_else(|| no_such_job(spec))?
    };
    let job = table.get_mut(job_id).ok_or_else(|| no_such_job(spec))?;
    if !job.state.is_stopped() {
        bail!("job {} already in background", job_id);
    }
    send_signal(job.pgid, Signal::SIGCONT)?;
    job.resume();
    let (pid, cmd) = (job.pid, job.cmd.clone());
    drop(guard);

    ctx.write_stdout(&format!("[{}] ({}) {}", job_id, pid, cmd))?;
    Ok(ExitStatus::ExitedWith(0))
}

/// Target of `kill`: `%N` selects a job's process group, a number a pid.
/// A pid that leads one of our jobs is signalled as the whole group.
pub fn execute_kill(_shell: &mut Shell, _ctx: &Context, spec: &str, signal: Signal) -> Result<()> {
    let mut guard = SignalGuard::block()?;
    let table = guard.jobs();
    let job = if spec.starts_with('%') {
        let job_id = parse_job_spec(spec, table).ok_or_else(|| no_such_job(spec))?;
        table.get(job_id).ok_or_else(|| no_such_job(spec))?
    } else {
        let raw = spec
            .parse::<i32>()
            .ok()
            .filter(|raw| *raw > 0)
            .ok_or_else(|| anyhow!("{}: arguments must be process or job IDs", spec))?;
        let pid = Pid::from_raw(raw);
        match table.find_live_by_pid(pid) {
            Some(job) => job,
            None => return send_signal_to_pid(pid, signal),
        }
    };

    send_signal(job.pgid, signal)?;
    if job.state.is_stopped() && needs_continue(signal) {
        // a stopped group holds the signal pending until it runs again
        debug!("KILL_CMD_CONTINUE: job {} to act on {:?}", job.job_id, signal);
        if let Err(err) = send_signal(job.pgid, Signal::SIGCONT) {
            warn!("KILL_CMD_SIGCONT_ERROR: job {}: {}", job.job_id, err);
        }
    }
    Ok(())
}

/// Signals a stopped process only acts on once continued.
fn needs_continue(signal: Signal) -> bool {
    !matches!(
        signal,
        Signal::SIGKILL
            | Signal::SIGSTOP
            | Signal::SIGTSTP
            | Signal::SIGTTIN
            | Signal::SIGTTOU
            | Signal::SIGCONT
    )
}
