use crate::errors::display_user_error;
use crate::shell::Shell;
use anyhow::Result;
use jsh_types::{Context, ExitStatus};
use std::io::{self, BufRead, ErrorKind, Write};
use tracing::debug;

/// Read-evaluate loop over stdin, one command per line.
pub struct Repl<'a> {
    pub shell: &'a mut Shell,
}

impl<'a> Repl<'a> {
    pub fn new(shell: &'a mut Shell) -> Self {
        Repl { shell }
    }

    fn print_prompt(&self) -> Result<()> {
        if self.shell.config.emit_prompt {
            let mut out = io::stdout().lock();
            out.write_all(self.shell.config.prompt.as_bytes())?;
            out.flush()?;
        }
        Ok(())
    }

    /// Runs until `quit`/`exit` or end of input. Command failures are
    /// reported and the loop goes on.
    pub fn run(&mut self, ctx: &Context) -> Result<ExitStatus> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut line = String::new();

        loop {
            if let Err(err) = self.shell.report_job_status(ctx) {
                display_user_error(&err);
            }
            self.print_prompt()?;

            line.clear();
            match input.read_line(&mut line) {
                Ok(0) => {
                    debug!("end of input");
                    return Ok(ExitStatus::ExitedWith(0));
                }
                Ok(_) => {}
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::InvalidData => {
                    eprintln!("jsh: input is not valid UTF-8");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }

            debug!("read line: {:?}", line.trim_end());
            if let Err(err) = self.shell.eval_str(ctx, &line) {
                display_user_error(&err);
            }
            if let Some(status) = self.shell.exited {
                return Ok(status);
            }
        }
    }
}
