use crate::ShellProxy;
use anyhow::{Result, bail};
use getopts::Options;
use jsh_types::{Context, ExitStatus};
use nix::sys::signal::Signal;
use tracing::debug;

pub const COMMAND_NAME: &str = "kill";

pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    match run(proxy, ctx, &argv) {
        Ok(code) => ExitStatus::ExitedWith(code),
        Err(e) => {
            let _ = ctx.write_stderr(&format!("{}: {}", COMMAND_NAME, e));
            ExitStatus::ExitedWith(2)
        }
    }
}

/// Accepts `9`, `KILL` and `SIGKILL` in any case.
pub fn parse_signal(name: &str) -> Option<Signal> {
    if let Ok(num) = name.parse::<i32>() {
        return Signal::try_from(num).ok();
    }
    let upper = name.to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    full.parse::<Signal>().ok()
}

/// Split off a leading `-SIGNAL` shorthand, which getopts cannot express.
fn split_shorthand(args: &[String]) -> (Option<&str>, &[String]) {
    match args.first() {
        Some(first)
            if first.len() > 1
                && first.starts_with('-')
                && !first.starts_with("--")
                && first != "-s"
                && first != "-h" =>
        {
            (Some(&first[1..]), &args[1..])
        }
        _ => (None, args),
    }
}

fn run(proxy: &mut dyn ShellProxy, ctx: &Context, argv: &[String]) -> Result<i32> {
    let args = argv.get(1..).unwrap_or_default();
    let (shorthand, args) = split_shorthand(args);

    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt("s", "signal", "specify signal to send", "SIGNAL");
    let matches = opts.parse(args)?;

    if matches.opt_present("h") {
        let brief = format!("Usage: {} [-s SIGNAL | -SIGNAL] %job|pid...", COMMAND_NAME);
        let _ = ctx.write_stdout(&opts.usage(&brief));
        return Ok(0);
    }

    let signal = match matches.opt_str("s").as_deref().or(shorthand) {
        Some(name) => match parse_signal(name) {
            Some(signal) => signal,
            None => bail!("invalid signal: {}", name),
        },
        None => Signal::SIGTERM,
    };

    if matches.free.is_empty() {
        bail!("usage: {} [-s SIGNAL | -SIGNAL] %job|pid...", COMMAND_NAME);
    }

    let mut exit_code = 0;
    for spec in &matches.free {
        debug!("kill {} with {}", spec, signal.as_str());
        if let Err(e) = proxy.send_job_signal(ctx, spec, signal) {
            let _ = ctx.write_stderr(&format!("{}: {}", COMMAND_NAME, e));
            exit_code = 1;
        }
    }
    Ok(exit_code)
}
