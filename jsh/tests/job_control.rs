use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);

/// A running shell fed line by line, with stdout and stderr merged into one
/// stream of lines.
struct Session {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<String>,
    seen: Vec<String>,
    _home: TempDir,
}

impl Session {
    fn start() -> Self {
        Self::start_with_config(None)
    }

    fn start_with_config(config: Option<&str>) -> Self {
        let home = TempDir::new().expect("create temp home");
        if let Some(config) = config {
            let dir = home.path().join("config").join("jsh");
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("config.toml"), config).unwrap();
        }
        let mut child = Command::new(env!("CARGO_BIN_EXE_jsh"))
            .arg("-p")
            .env("XDG_CONFIG_HOME", home.path().join("config"))
            .env("XDG_STATE_HOME", home.path().join("state"))
            .env_remove("JSH_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn jsh");

        let (tx, lines) = channel();
        let stdout = child.stdout.take().unwrap();
        let stderr = child.stderr.take().unwrap();
        let out_tx = tx.clone();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if out_tx.send(line).is_err() {
                    break;
                }
            }
        });
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Session {
            stdin: child.stdin.take(),
            child,
            lines,
            seen: Vec::new(),
            _home: home,
        }
    }

    fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    fn send(&mut self, line: &str) {
        let stdin = self.stdin.as_mut().expect("stdin closed");
        writeln!(stdin, "{line}").unwrap();
        stdin.flush().unwrap();
    }

    fn signal(&self, signal: Signal) {
        kill(self.pid(), signal).expect("signal shell");
    }

    /// Wait for a line containing `needle` and return it.
    fn expect(&mut self, needle: &str) -> String {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(left) {
                Ok(line) => {
                    self.seen.push(line.clone());
                    if line.contains(needle) {
                        return line;
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    panic!("no line containing {needle:?}; saw {:#?}", self.seen)
                }
            }
        }
    }

    /// Close stdin and wait for the shell to exit.
    fn finish(mut self) -> (std::process::ExitStatus, Vec<String>) {
        drop(self.stdin.take());
        let deadline = Instant::now() + TIMEOUT;
        let status = loop {
            if let Some(status) = self.child.try_wait().unwrap() {
                break status;
            }
            if Instant::now() > deadline {
                let _ = self.child.kill();
                panic!("shell did not exit; saw {:#?}", self.seen);
            }
            thread::sleep(Duration::from_millis(20));
        };
        while let Ok(line) = self.lines.recv_timeout(Duration::from_millis(200)) {
            self.seen.push(line);
        }
        (status, self.seen)
    }
}

/// pid inside "[1] (1234) sleep 5 &" style lines.
fn pid_in(line: &str) -> i32 {
    line.split(['(', ')'])
        .nth(1)
        .and_then(|pid| pid.parse().ok())
        .unwrap_or_else(|| panic!("no pid in {line:?}"))
}

#[test]
fn background_launch_does_not_block() {
    let mut session = Session::start();
    let start = Instant::now();
    session.send("sleep 5 &");
    let line = session.expect("sleep 5 &");
    assert!(line.starts_with("[1] ("), "{line}");
    session.send("/bin/echo marker");
    session.expect("marker");
    assert!(start.elapsed() < Duration::from_secs(4));

    let job_pid = pid_in(&line);
    session.send("kill %1");
    thread::sleep(Duration::from_millis(300));
    session.send("jobs");
    session.expect("terminated by signal SIGTERM");
    session.expect("jobs: there are no jobs");
    assert!(kill(Pid::from_raw(job_pid), None).is_err());

    let (status, _) = session.finish();
    assert!(status.success());
}

#[test]
fn background_job_is_reported_once_and_removed() {
    let mut session = Session::start();
    session.send("sleep 1 &");
    session.expect("[1] (");
    thread::sleep(Duration::from_millis(1500));
    session.send("jobs");
    let done = session.expect("Done sleep 1 &");
    assert!(done.starts_with("[1] ("), "{done}");
    session.expect("jobs: there are no jobs");
    session.send("jobs");
    session.expect("jobs: there are no jobs");

    let (status, seen) = session.finish();
    assert!(status.success());
    assert_eq!(seen.iter().filter(|l| l.contains("Done")).count(), 1);
}

#[test]
fn rapid_background_jobs_are_all_reaped() {
    let mut session = Session::start_with_config(Some("max_jobs = 64\n"));
    for _ in 0..20 {
        session.send("/bin/true &");
    }
    session.send("sleep 1");
    session.send("jobs");
    session.expect("jobs: there are no jobs");

    #[cfg(target_os = "linux")]
    assert_eq!(zombie_children(session.pid()), 0);

    let (status, seen) = session.finish();
    assert!(status.success());
    assert!(
        !seen.iter().any(|l| l.contains("belongs to no job")),
        "{seen:#?}"
    );
    assert_eq!(
        seen.iter().filter(|l| l.contains("Done /bin/true &")).count(),
        20,
        "{seen:#?}"
    );
}

#[cfg(target_os = "linux")]
fn zombie_children(parent: Pid) -> usize {
    let mut zombies = 0;
    for entry in fs::read_dir("/proc").unwrap().flatten() {
        let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        // "pid (comm) state ppid ..."; comm may contain spaces
        let Some(rest) = stat.rsplit_once(')').map(|(_, rest)| rest) else {
            continue;
        };
        let mut fields = rest.split_whitespace();
        let state = fields.next();
        let ppid = fields.next().and_then(|p| p.parse::<i32>().ok());
        if state == Some("Z") && ppid == Some(parent.as_raw()) {
            zombies += 1;
        }
    }
    zombies
}

#[test]
fn background_exit_does_not_end_the_foreground_wait() {
    let mut session = Session::start();
    session.send("sleep 0.2 &");
    session.expect("sleep 0.2 &");
    let start = Instant::now();
    session.send("sleep 1");
    session.send("/bin/echo after");
    session.expect("after");
    assert!(start.elapsed() >= Duration::from_secs(1));

    session.send("jobs");
    session.expect("jobs: there are no jobs");
    let (status, seen) = session.finish();
    assert!(status.success());
    assert_eq!(
        seen.iter().filter(|l| l.contains("Done sleep 0.2 &")).count(),
        1,
        "{seen:#?}"
    );
}

#[test]
fn interrupt_reaches_only_the_foreground_job() {
    let mut session = Session::start();
    session.send("sleep 3 &");
    let background = session.expect("sleep 3 &");
    session.send("sleep 30");
    thread::sleep(Duration::from_millis(700));
    session.signal(Signal::SIGINT);
    let line = session.expect("terminated by signal SIGINT");
    assert!(line.starts_with("Job [2] ("), "{line}");

    session.send("jobs");
    let row = session.expect("sleep 3 &");
    assert!(row.contains("running"), "{row}");
    assert!(kill(Pid::from_raw(pid_in(&background)), None).is_ok());

    thread::sleep(Duration::from_millis(3000));
    session.send("jobs");
    session.expect("Done sleep 3 &");

    let (status, _) = session.finish();
    assert!(status.success(), "shell must survive SIGINT");
}

#[test]
fn interrupt_without_foreground_job_is_ignored() {
    let mut session = Session::start();
    session.send("/bin/echo ready");
    session.expect("ready");
    session.signal(Signal::SIGINT);
    session.signal(Signal::SIGTSTP);
    session.send("/bin/echo alive");
    session.expect("alive");
    let (status, _) = session.finish();
    assert!(status.success());
}

#[test]
fn stopped_job_resumes_with_fg() {
    let mut session = Session::start();
    session.send("sleep 2");
    thread::sleep(Duration::from_millis(500));
    session.signal(Signal::SIGTSTP);
    let line = session.expect("stopped by signal SIGTSTP");
    assert!(line.starts_with("Job [1] ("), "{line}");

    session.send("jobs");
    let row = session.expect("sleep 2");
    assert!(row.contains("stopped"), "{row}");

    let start = Instant::now();
    session.send("fg %1");
    session.expect("jsh: job 1 'sleep 2' to foreground");
    session.send("/bin/echo back");
    session.expect("back");
    assert!(start.elapsed() >= Duration::from_millis(1000));

    session.send("jobs");
    session.expect("jobs: there are no jobs");
    let (status, _) = session.finish();
    assert!(status.success());
}

#[test]
fn stopped_job_resumes_with_bg() {
    let mut session = Session::start();
    session.send("sleep 1");
    thread::sleep(Duration::from_millis(300));
    session.signal(Signal::SIGTSTP);
    session.expect("stopped by signal SIGTSTP");

    session.send("bg");
    let line = session.expect("sleep 1");
    assert!(line.starts_with("[1] ("), "{line}");
    session.send("bg %1");
    session.expect("bg: job 1 already in background");

    thread::sleep(Duration::from_millis(1500));
    session.send("jobs");
    session.expect("Done sleep 1");
    session.expect("jobs: there are no jobs");
    let (status, _) = session.finish();
    assert!(status.success());
}

#[test]
fn kill_builtin_stops_and_signals_jobs() {
    let mut session = Session::start();
    session.send("sleep 30 &");
    session.expect("[1] (");
    session.send("kill -STOP %1");
    thread::sleep(Duration::from_millis(300));
    session.send("jobs");
    session.expect("stopped by signal SIGSTOP");

    session.send("kill -s KILL %1");
    thread::sleep(Duration::from_millis(300));
    session.send("jobs");
    session.expect("terminated by signal SIGKILL");
    session.expect("jobs: there are no jobs");

    session.send("kill %4");
    session.expect("kill: %4: no such job");
    let (status, _) = session.finish();
    assert!(status.success());
}

#[test]
fn quit_exits_zero_with_jobs_outstanding() {
    let mut session = Session::start();
    session.send("sleep 30 &");
    let line = session.expect("[1] (");
    session.send("quit");
    let (status, _) = session.finish();
    assert!(status.success());
    let _ = kill(Pid::from_raw(pid_in(&line)), Signal::SIGKILL);
}
