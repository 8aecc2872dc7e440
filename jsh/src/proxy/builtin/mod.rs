//! Shell-side handlers for builtins that need the job table.

pub mod jobs;
