use crate::process::table::{DEFAULT_MAX_JOBS, MAX_JOBS_LIMIT};
use crate::shell::APP_NAME;
use anyhow::Context as _;
use jsh_types::{JshError, JshResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "config.toml";
pub const LOG_FILE: &str = "jsh.log";

/// Settings read from `$XDG_CONFIG_HOME/jsh/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub prompt: String,
    pub emit_prompt: bool,
    pub max_jobs: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prompt: "jsh> ".to_string(),
            emit_prompt: true,
            max_jobs: DEFAULT_MAX_JOBS,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> JshResult<Self> {
        let config: Config = toml::from_str(text).map_err(|e| JshError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_file(path: &Path) -> JshResult<Self> {
        debug!("loading config from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            JshError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text).map_err(|e| match e {
            JshError::Config(msg) => JshError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// `explicit` comes from `--config`. Without it the XDG location is used
    /// and a missing file means defaults.
    pub fn load(explicit: Option<&Path>) -> JshResult<Self> {
        match explicit {
            Some(path) => Self::load_file(path),
            None => match find_config_file(CONFIG_FILE) {
                Some(path) => Self::load_file(&path),
                None => Ok(Config::default()),
            },
        }
    }

    fn validate(&self) -> JshResult<()> {
        if !(1..=MAX_JOBS_LIMIT).contains(&self.max_jobs) {
            return Err(JshError::Config(format!(
                "max_jobs must be between 1 and {}, got {}",
                MAX_JOBS_LIMIT, self.max_jobs
            )));
        }
        Ok(())
    }
}

/// Existing config file, if any.
pub fn find_config_file(name: &str) -> Option<PathBuf> {
    xdg::BaseDirectories::with_prefix(APP_NAME)
        .ok()?
        .find_config_file(name)
}

/// Get the path to a state file (e.g. logs), creating its directory.
pub fn get_state_file(name: &str) -> anyhow::Result<PathBuf> {
    let xdg_dir =
        xdg::BaseDirectories::with_prefix(APP_NAME).context("failed get xdg directory")?;
    xdg_dir.place_state_file(name).context("failed get path")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn init() {
        let _ = tracing_subscriber::fmt::try_init();
    }

    #[test]
    fn empty_file_gives_defaults() {
        init();
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        init();
        let config = Config::from_toml("prompt = \"$ \"\nmax_jobs = 4\n").unwrap();
        assert_eq!(config.prompt, "$ ");
        assert_eq!(config.max_jobs, 4);
        assert!(config.emit_prompt);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn max_jobs_out_of_range() {
        init();
        assert!(matches!(
            Config::from_toml("max_jobs = 0"),
            Err(JshError::Config(_))
        ));
        assert!(matches!(
            Config::from_toml("max_jobs = 65"),
            Err(JshError::Config(_))
        ));
        assert!(Config::from_toml("max_jobs = 64").is_ok());
    }

    #[test]
    fn unknown_key_is_rejected() {
        init();
        assert!(matches!(
            Config::from_toml("promt = \"x\""),
            Err(JshError::Config(_))
        ));
    }

    #[test]
    fn wrong_type_is_rejected() {
        init();
        assert!(Config::from_toml("emit_prompt = \"yes\"").is_err());
    }

    #[test]
    fn load_explicit_file() {
        init();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "emit_prompt = false").unwrap();
        writeln!(file, "log_level = \"debug\"").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert!(!config.emit_prompt);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }
}
