use super::ShellProxy;
use jsh_types::{Context, ExitStatus};

/// `fg [spec]`: resume a job in the foreground and wait for it.
/// The status is the job's, as if it had been launched in the foreground.
pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    if argv.len() > 2 {
        ctx.write_stderr("fg: usage: fg [%job]").ok();
        return ExitStatus::ExitedWith(2);
    }
    match proxy.dispatch(ctx, "fg", argv) {
        Ok(status) => status,
        Err(e) => {
            ctx.write_stderr(&format!("fg: {e}")).ok();
            ExitStatus::ExitedWith(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{MockProxy, quiet_context};

    #[test]
    fn passes_job_spec_through() {
        let ctx = quiet_context();
        let mut proxy = MockProxy::default();
        command(&ctx, vec!["fg".into(), "%2".into()], &mut proxy);
        assert_eq!(
            proxy.dispatched,
            vec![("fg".to_string(), vec!["fg".to_string(), "%2".to_string()])]
        );
    }

    #[test]
    fn unknown_job_is_not_fatal() {
        let ctx = quiet_context();
        let mut proxy = MockProxy {
            fail: true,
            ..Default::default()
        };
        assert_eq!(
            command(&ctx, vec!["fg".into(), "%9".into()], &mut proxy),
            ExitStatus::ExitedWith(1)
        );
        assert!(!proxy.exited);
    }
}
