use tracing::debug;

/// Display error in a user-friendly format without stack traces.
pub fn display_user_error(err: &anyhow::Error) {
    debug!("user error: {:?}", err);
    eprintln!("jsh: {}", err);
}
