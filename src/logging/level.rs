use core::fmt;
use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};

/// Severity of a log record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    DPanic = 4,
    Panic = 5,
    Fatal = 6,
}

impl Level {
    pub const ALL: [Level; 7] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::DPanic,
        Level::Panic,
        Level::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::DPanic => "dpanic",
            Level::Panic => "panic",
            Level::Fatal => "fatal",
        }
    }

    /// Text placed between the brackets of the console prefix.
    pub fn symbol(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "i",
            Level::Warn => "!",
            Level::Error => "✘",
            Level::DPanic => "DPANIC",
            Level::Panic => "PANIC",
            Level::Fatal => "FATAL",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }

    fn from_u8(value: u8) -> Level {
        match value {
            0 => Level::Debug,
            1 => Level::Info,
            2 => Level::Warn,
            3 => Level::Error,
            4 => Level::DPanic,
            5 => Level::Panic,
            _ => Level::Fatal,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized level: {:?}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_level(s).ok_or_else(|| ParseLevelError(s.to_string()))
    }
}

/// Parses a level name, ignoring case and surrounding whitespace.
///
/// Empty input is not a level, so an unset environment variable never
/// selects one.
pub fn parse_level(text: &str) -> Option<Level> {
    match text.trim().to_ascii_lowercase().as_str() {
        "debug" => Some(Level::Debug),
        "info" => Some(Level::Info),
        "warn" | "warning" => Some(Level::Warn),
        "error" => Some(Level::Error),
        "dpanic" => Some(Level::DPanic),
        "panic" => Some(Level::Panic),
        "fatal" => Some(Level::Fatal),
        _ => None,
    }
}

/// Anything that can decide whether a level should be written.
pub trait LevelEnabler: Send + Sync {
    fn enabled(&self, level: Level) -> bool;
}

impl LevelEnabler for Level {
    fn enabled(&self, level: Level) -> bool {
        level >= *self
    }
}

/// A minimum level shared by every clone and updated without locking.
#[derive(Debug, Clone)]
pub struct AtomicLevel {
    inner: Arc<AtomicU8>,
}

impl AtomicLevel {
    pub fn new(level: Level) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(level as u8)),
        }
    }

    pub fn level(&self) -> Level {
        Level::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set_level(&self, level: Level) {
        self.inner.store(level as u8, Ordering::Release);
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level()
    }
}

impl Default for AtomicLevel {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

impl LevelEnabler for AtomicLevel {
    fn enabled(&self, level: Level) -> bool {
        AtomicLevel::enabled(self, level)
    }
}
