use super::ShellProxy;
use jsh_types::{Context, ExitStatus};

/// `bg [spec]`: resume a stopped job without waiting for it.
pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    if argv.len() > 2 {
        ctx.write_stderr("bg: usage: bg [%job]").ok();
        return ExitStatus::ExitedWith(2);
    }
    match proxy.dispatch(ctx, "bg", argv) {
        Ok(status) => status,
        Err(e) => {
            ctx.write_stderr(&format!("bg: {e}")).ok();
            ExitStatus::ExitedWith(1)
        }
    }
}
