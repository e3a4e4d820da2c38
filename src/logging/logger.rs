use core::fmt;
use std::{
    io::{self, Write},
    sync::Arc,
};

use super::{
    formatters::{ColorPolicy, ConsoleEncoder, EncoderConfig, JsonEncoder},
    level::{AtomicLevel, Level},
    record::{Field, FieldValue, LogRecord},
    rotation::{FileLoggerConfig, RotatingFile},
    sinks::{Core, NullSink, StderrWriter, Tee},
    LogSink, SyncWriter,
};

/// Cheap handle to a sink plus the name and context fields stamped onto
/// every record it emits.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    name: Arc<str>,
    context: Arc<[Field]>,
    report_errors: bool,
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            name: Arc::from(""),
            context: Arc::from(Vec::new()),
            report_errors: false,
        }
    }

    /// A logger that drops everything.
    pub fn nop() -> Self {
        Self::new(Arc::new(NullSink::new()))
    }

    /// Adds a segment to the logger name, joining segments with `.`.
    pub fn named(&self, name: &str) -> Self {
        let name = match (self.name.is_empty(), name.is_empty()) {
            (_, true) => self.name.clone(),
            (true, false) => Arc::from(name),
            (false, false) => Arc::from(format!("{}.{}", self.name, name)),
        };
        Self {
            name,
            ..self.clone()
        }
    }

    /// Fields appended after the record's own fields on every emission.
    pub fn with(&self, fields: impl IntoIterator<Item = Field>) -> Self {
        let mut context = self.context.to_vec();
        context.extend(fields);
        Self {
            context: Arc::from(context),
            ..self.clone()
        }
    }

    /// Print sink failures to stderr instead of dropping them silently.
    pub fn with_error_reporting(self, report_errors: bool) -> Self {
        Self {
            report_errors,
            ..self
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.sink.enabled(level)
    }

    pub fn log<K, V>(
        &self,
        level: Level,
        message: impl Into<String>,
        fields: impl IntoIterator<Item = (K, V)>,
    ) where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        if !self.enabled(level) {
            return;
        }

        let record = LogRecord::new(level, message)
            .with_fields(fields.into_iter().map(|(k, v)| Field::new(k, v)));
        self.emit(record);
    }

    pub fn emit(&self, record: LogRecord) {
        if let Err(err) = self.try_emit(record) {
            if self.report_errors {
                // stderr may be closed too
                let _ = writeln!(io::stderr(), "clio: {:#}", err);
            }
        }
    }

    pub fn try_emit(&self, record: LogRecord) -> eyre::Result<()> {
        if !self.enabled(record.level()) {
            return Ok(());
        }

        let record = self.decorate(record);
        self.sink.write_log(&record)
    }

    pub fn flush(&self) -> eyre::Result<()> {
        self.sink.flush()
    }

    fn decorate(&self, record: LogRecord) -> LogRecord {
        let record = if record.logger_name().is_empty() && !self.name.is_empty() {
            record.with_logger_name(&*self.name)
        } else {
            record
        };

        if self.context.is_empty() {
            record
        } else {
            record.with_fields(self.context.iter().cloned())
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Composes a console sink and an optional JSON file sink into a [`Logger`].
pub struct Builder {
    level: AtomicLevel,
    console: Option<Arc<dyn SyncWriter>>,
    file_config: Option<FileLoggerConfig>,
    json_writer: Option<(Arc<dyn SyncWriter>, Option<Level>)>,
    no_color: bool,
    encoder_config: EncoderConfig,
    report_errors: bool,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            level: AtomicLevel::default(),
            console: None,
            file_config: None,
            json_writer: None,
            no_color: false,
            encoder_config: EncoderConfig::new(),
            report_errors: false,
        }
    }

    pub fn with_level(self, level: AtomicLevel) -> Self {
        Self { level, ..self }
    }

    pub fn with_stderr_sink(self) -> Self {
        self.with_writer(Arc::new(StderrWriter))
    }

    pub fn with_writer(self, writer: Arc<dyn SyncWriter>) -> Self {
        Self {
            console: Some(writer),
            ..self
        }
    }

    /// Opens a rotating JSON log file when the logger is built.
    pub fn with_file_sink(self, config: FileLoggerConfig) -> Self {
        Self {
            file_config: Some(config),
            json_writer: None,
            ..self
        }
    }

    /// Writes JSON lines to an already opened writer. A `None` threshold
    /// follows the shared level.
    pub fn with_json_writer(self, writer: Arc<dyn SyncWriter>, level: Option<Level>) -> Self {
        Self {
            json_writer: Some((writer, level)),
            file_config: None,
            ..self
        }
    }

    pub fn with_no_color(self, no_color: bool) -> Self {
        Self { no_color, ..self }
    }

    pub fn with_encoder_config(self, encoder_config: EncoderConfig) -> Self {
        Self {
            encoder_config,
            ..self
        }
    }

    pub fn with_error_reporting(self, report_errors: bool) -> Self {
        Self {
            report_errors,
            ..self
        }
    }

    pub fn build(&self) -> eyre::Result<Logger> {
        match (&self.json_writer, &self.file_config) {
            (None, Some(config)) => {
                let file: Arc<dyn SyncWriter> = Arc::new(RotatingFile::open(config)?);
                Ok(self.assemble(Some((file, config.level))))
            }
            _ => Ok(self.compose()),
        }
    }

    /// Builds from writers that are already open, so it cannot fail. A
    /// pending file config is ignored.
    pub(crate) fn compose(&self) -> Logger {
        self.assemble(self.json_writer.clone())
    }

    fn assemble(&self, json: Option<(Arc<dyn SyncWriter>, Option<Level>)>) -> Logger {
        let mut sinks: Vec<Arc<dyn LogSink>> = Vec::new();

        if let Some(writer) = &self.console {
            let encoder = ConsoleEncoder::new(
                self.encoder_config.clone(),
                ColorPolicy::new(!self.no_color),
            );
            sinks.push(Arc::new(Core::new(
                writer.clone(),
                encoder,
                self.level.clone(),
            )));
        }

        if let Some((writer, level)) = json {
            let sink: Arc<dyn LogSink> = match level {
                Some(level) => Arc::new(Core::new(writer, JsonEncoder::new(), level)),
                None => Arc::new(Core::new(writer, JsonEncoder::new(), self.level.clone())),
            };
            sinks.push(sink);
        }

        let sink: Arc<dyn LogSink> = match sinks.len() {
            0 => Arc::new(NullSink::new()),
            1 => sinks.remove(0),
            _ => Arc::new(Tee::new(sinks)),
        };

        Logger::new(sink).with_error_reporting(self.report_errors)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
