use super::ShellProxy;
use jsh_types::{Context, ExitStatus};

/// `jobs`: report finished background jobs, then list the live ones.
pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    if argv.len() > 1 {
        ctx.write_stderr("jobs: usage: jobs").ok();
        return ExitStatus::ExitedWith(2);
    }
    match proxy.dispatch(ctx, "jobs", argv) {
        Ok(status) => status,
        Err(e) => {
            ctx.write_stderr(&format!("jobs: {e}")).ok();
            ExitStatus::ExitedWith(1)
        }
    }
}
