#![allow(clippy::module_inception)]

pub mod error;
pub mod fork;
pub mod job;
pub mod process;
pub mod signal;
pub mod state;
pub mod table;
pub mod wait;

pub use error::LaunchError;
pub use job::Job;
pub use process::Process;
pub use signal::SignalGuard;
pub use state::{ExitInfo, JobId, JobState, Mode, Transition};
pub use table::JobTable;
pub use wait::wait_for_job;
