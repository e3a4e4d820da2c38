use std::{io::IsTerminal, path::PathBuf, sync::Arc};

use crate::logging::{parse_level, Level, StderrWriter, SyncWriter};

/// Variables consulted for the initial level, highest priority first.
pub const DEFAULT_LEVEL_ENV_VARS: [&str; 2] = ["CLIO_LOG", "CF_LOG"];

/// How a registry starts out.
#[derive(Clone)]
pub struct Options {
    pub level_env_vars: Vec<String>,
    pub level: Option<Level>,
    pub writer: Arc<dyn SyncWriter>,
    pub no_color: bool,
}

impl Options {
    /// Stderr, color auto-detected, level Info unless set explicitly.
    pub fn new() -> Self {
        Self {
            level_env_vars: Vec::new(),
            level: None,
            writer: Arc::new(StderrWriter),
            no_color: no_color_requested(),
        }
    }

    pub fn from_env() -> Self {
        Self::new().with_level_env_vars(DEFAULT_LEVEL_ENV_VARS)
    }

    pub fn with_level_env_vars<S: Into<String>>(self, vars: impl IntoIterator<Item = S>) -> Self {
        Self {
            level_env_vars: vars.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub fn with_level(self, level: Level) -> Self {
        Self {
            level: Some(level),
            ..self
        }
    }

    pub fn with_writer(self, writer: Arc<dyn SyncWriter>) -> Self {
        Self { writer, ..self }
    }

    pub fn with_no_color(self, no_color: bool) -> Self {
        Self { no_color, ..self }
    }

    /// The explicit level, else the first parseable env var, else Info.
    pub fn log_level(&self) -> Level {
        self.level
            .or_else(|| level_from_env(&self.level_env_vars))
            .unwrap_or(Level::Info)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

pub fn level_from_env<S: AsRef<str>>(vars: &[S]) -> Option<Level> {
    level_from_lookup(vars, |name| std::env::var(name).ok())
}

/// Walks `vars` in order and returns the first value that parses. Unset and
/// unparseable variables are skipped.
pub fn level_from_lookup<S, F>(vars: &[S], lookup: F) -> Option<Level>
where
    S: AsRef<str>,
    F: Fn(&str) -> Option<String>,
{
    vars.iter()
        .filter_map(|name| lookup(name.as_ref()))
        .find_map(|value| parse_level(&value))
}

/// True when `NO_COLOR` is set (to anything), `TERM` is `dumb`, or stderr is
/// not a terminal.
pub fn no_color_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some()
        || std::env::var("TERM").is_ok_and(|term| term == "dumb")
        || !std::io::stderr().is_terminal()
}

pub trait ConfigManager: Sized + Clone + Send + Sync {
    fn get_log_path(&self) -> eyre::Result<String>;
}

#[derive(Default, Clone, Debug)]
pub struct LocalConfigManager {}

impl LocalConfigManager {
    pub fn new() -> Self {
        Self {}
    }
}

#[cfg(not(target_os = "windows"))]
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(target_os = "windows")]
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE").map(PathBuf::from)
}

pub fn data_dir() -> PathBuf {
    let data_dir = std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|home| home.join(".local").join("share")))
        .unwrap_or_else(std::env::temp_dir);

    data_dir.join("clio")
}

impl ConfigManager for LocalConfigManager {
    fn get_log_path(&self) -> eyre::Result<String> {
        let mut log_path = data_dir();
        log_path.push("clio.log");

        match log_path.to_str() {
            Some(path) => Ok(path.to_string()),
            None => Err(eyre::eyre!("Can't construct log path in data dir!")),
        }
    }
}
