mod formatters;
mod level;
mod logger;
mod record;
mod registry;
mod rotation;
mod sinks;

pub use formatters::{ColorPolicy, ConsoleEncoder, EncoderConfig, JsonEncoder, BLANK_KEY};
pub use level::{parse_level, AtomicLevel, Level, LevelEnabler, ParseLevelError};
pub use logger::{Builder, Logger};
pub use record::{Field, FieldValue, LogRecord, RenderMode, NO_PREFIX_NAME, SUCCESS_NAME};
pub use registry::{current, global, init_log_bridge, replace_globals, Registry};
pub use rotation::{FileLoggerConfig, RotatingFile};
pub use sinks::{Core, LockedWriter, NullSink, SharedBuffer, StderrWriter, StdoutWriter, Tee};

/// Turns a record into the bytes of one output line.
pub trait LogEncoder: Sync + Send {
    fn encode(&self, record: &LogRecord) -> eyre::Result<Vec<u8>>;
}

/// A destination for records, gated by its own threshold.
pub trait LogSink: Sync + Send {
    fn enabled(&self, level: Level) -> bool;
    fn write_log(&self, record: &LogRecord) -> eyre::Result<()>;
    fn flush(&self) -> eyre::Result<()>;
}

/// A byte destination that is safe to share between threads.
///
/// Implementations must write each line as a unit; sinks call them without
/// any extra locking.
pub trait SyncWriter: Sync + Send {
    fn write_line(&self, line: &[u8]) -> std::io::Result<()>;
    fn flush(&self) -> std::io::Result<()>;
}
