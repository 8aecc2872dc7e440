use crate::config::{Config, LOG_FILE, get_state_file};
use crate::errors::display_user_error;
use crate::repl::Repl;
use crate::shell::Shell;
use anyhow::{Result, anyhow};
use clap::Parser;
use jsh_types::Context;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod errors;
pub mod parser;
pub mod process;
pub mod proxy;
pub mod repl;
pub mod shell;

/// Environment variable holding a tracing filter that overrides `log_level`.
pub const LOG_ENV: &str = "JSH_LOG";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run a single command line and exit with its status
    #[arg(short, long)]
    pub command: Option<String>,

    /// Do not print a prompt before reading each line
    #[arg(short = 'p', long)]
    pub no_prompt: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Read settings from this file instead of the XDG config location
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn lib_main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("jsh: {err}; using defaults");
            Config::default()
        }
    };
    if cli.no_prompt {
        config.emit_prompt = false;
    }

    // Logging is best effort: without a writable state directory the
    // shell runs silently.
    let _ = init_tracing(&config, cli.verbose);

    let mut shell = Shell::new(config);
    let ctx = create_context(&shell);
    if let Err(err) = shell.set_signals() {
        display_user_error(&err);
        return ExitCode::FAILURE;
    }

    if let Some(command) = cli.command.as_deref() {
        execute_command(&mut shell, &ctx, command)
    } else {
        run_interactive(&mut shell, &ctx)
    }
}

pub fn init_tracing(config: &Config, verbose: bool) -> Result<()> {
    let path = get_state_file(LOG_FILE)?;
    let log_file = Arc::new(
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?,
    );
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(log_file)
        .try_init()
        .map_err(|e| anyhow!("{e}"))?;
    Ok(())
}

pub fn create_context(shell: &Shell) -> Context {
    Context::new(shell.pid, shell.pgid)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}

pub fn execute_command(shell: &mut Shell, ctx: &Context, command: &str) -> ExitCode {
    debug!("start shell in command mode");
    match shell.eval_str(ctx, command) {
        Ok(status) => {
            debug!("run command mode {:?} : {:?}", command, &status);
            if let Err(err) = shell.report_job_status(ctx) {
                display_user_error(&err);
            }
            exit_code(status.code())
        }
        Err(err) => {
            display_user_error(&err);
            ExitCode::FAILURE
        }
    }
}

pub fn run_interactive(shell: &mut Shell, ctx: &Context) -> ExitCode {
    debug!("start shell interactive:{}", ctx.interactive);
    let mut repl = Repl::new(shell);
    match repl.run(ctx) {
        Ok(status) => exit_code(status.code()),
        Err(err) => {
            display_user_error(&err);
            ExitCode::FAILURE
        }
    }
}
