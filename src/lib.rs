//! Logging for command line tools.
//!
//! Records are rendered as short, optionally colorized lines such as
//! `[i] calling an API  url:http://example.com` and can be mirrored as JSON
//! lines to a rotating file. A [`Registry`] owns the active logger and the
//! shared level; [`global()`] is the process-wide instance.

pub mod config;
pub mod logging;
mod utils;

pub use config::Options;
pub use logging::{
    current, global, init_log_bridge, replace_globals, AtomicLevel, Builder, Field, FieldValue,
    FileLoggerConfig, Level, LogRecord, Logger, Registry, NO_PREFIX_NAME, SUCCESS_NAME,
};
