use std::sync::{Arc, OnceLock};

use eyre::Context;
use log::LevelFilter;
use parking_lot::{Mutex, RwLock};

use super::{
    formatters::EncoderConfig,
    level::{parse_level, AtomicLevel, Level},
    logger::{Builder, Logger},
    record::{Field, FieldValue, LogRecord},
    rotation::{FileLoggerConfig, RotatingFile},
    SyncWriter,
};
use crate::config::{level_from_env, Options};

struct Settings {
    error_writer: Arc<dyn SyncWriter>,
    file: Option<(Arc<dyn SyncWriter>, Option<Level>)>,
    no_color: bool,
    encoder_config: EncoderConfig,
}

/// Owns the active logger and the shared level.
///
/// Emitting threads only hold the read lock long enough to clone the current
/// [`Logger`]; writes happen after it is released. Reconfiguration builds a
/// fresh logger and swaps it in under the write lock.
pub struct Registry {
    level: AtomicLevel,
    current: RwLock<Logger>,
    settings: Mutex<Settings>,
}

impl Registry {
    pub fn new(options: Options) -> Self {
        let level = AtomicLevel::new(options.log_level());
        let settings = Settings {
            error_writer: options.writer,
            file: None,
            no_color: options.no_color,
            encoder_config: EncoderConfig::new(),
        };
        let logger = compose(&level, &settings);

        Self {
            level,
            current: RwLock::new(logger),
            settings: Mutex::new(settings),
        }
    }

    /// Handle to the shared level. Every sink built by this registry follows
    /// it unless configured with its own threshold.
    pub fn level(&self) -> &AtomicLevel {
        &self.level
    }

    pub fn set_level(&self, level: Level) {
        self.level.set_level(level);
    }

    /// Leaves the level untouched if `text` is not a level name.
    pub fn set_level_from_string(&self, text: &str) {
        if let Some(level) = parse_level(text) {
            self.level.set_level(level);
        }
    }

    /// Applies the first env var in `vars` holding a level name. Leaves the
    /// level untouched if none does.
    pub fn set_level_from_env<S: AsRef<str>>(&self, vars: &[S]) {
        if let Some(level) = level_from_env(vars) {
            self.level.set_level(level);
        }
    }

    pub fn is_debug(&self) -> bool {
        self.level.enabled(Level::Debug)
    }

    pub fn current(&self) -> Logger {
        self.current.read().clone()
    }

    /// Installs `logger` and returns a closure that puts the previous one
    /// back.
    ///
    /// Only one step of undo is kept per call. Nested replacements have to be
    /// restored in reverse order.
    pub fn replace(&self, logger: Logger) -> impl FnOnce() + Send + '_ {
        let previous = self.swap(logger);
        move || {
            self.swap(previous);
        }
    }

    fn swap(&self, logger: Logger) -> Logger {
        std::mem::replace(&mut *self.current.write(), logger)
    }

    /// Sends console output to `writer` from now on.
    pub fn set_error_writer(&self, writer: Arc<dyn SyncWriter>) {
        self.reconfigure(|settings| settings.error_writer = writer);
    }

    pub fn set_no_color(&self, no_color: bool) {
        self.reconfigure(|settings| settings.no_color = no_color);
    }

    pub fn set_encoder_config(&self, encoder_config: EncoderConfig) {
        self.reconfigure(|settings| settings.encoder_config = encoder_config);
    }

    /// Mirrors every record as JSON to a rotating file, next to the console.
    pub fn set_file_logging(&self, config: FileLoggerConfig) -> eyre::Result<()> {
        let file = RotatingFile::open(&config).with_context(|| {
            format!("Failed enabling file logging to {}", config.filename.display())
        })?;
        let file: Arc<dyn SyncWriter> = Arc::new(file);
        self.reconfigure(|settings| settings.file = Some((file, config.level)));
        Ok(())
    }

    pub fn disable_file_logging(&self) {
        self.reconfigure(|settings| settings.file = None);
    }

    fn reconfigure(&self, update: impl FnOnce(&mut Settings)) {
        let mut settings = self.settings.lock();
        update(&mut settings);
        let logger = compose(&self.level, &settings);
        self.swap(logger);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Options::new())
    }
}

fn compose(level: &AtomicLevel, settings: &Settings) -> Logger {
    let builder = Builder::new()
        .with_level(level.clone())
        .with_writer(settings.error_writer.clone())
        .with_no_color(settings.no_color)
        .with_encoder_config(settings.encoder_config.clone());

    let builder = match &settings.file {
        Some((writer, threshold)) => builder.with_json_writer(writer.clone(), *threshold),
        None => builder,
    };

    builder.compose()
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry, seeded from the environment on first use.
pub fn global() -> &'static Registry {
    GLOBAL.get_or_init(|| Registry::new(Options::from_env()))
}

pub fn current() -> Logger {
    global().current()
}

pub fn replace_globals(logger: Logger) -> impl FnOnce() + Send {
    global().replace(logger)
}

struct LogBridge;

struct FieldCollector(Vec<Field>);

impl<'kvs> log::kv::VisitSource<'kvs> for FieldCollector {
    fn visit_pair(
        &mut self,
        key: log::kv::Key<'kvs>,
        value: log::kv::Value<'kvs>,
    ) -> Result<(), log::kv::Error> {
        let value = if let Some(b) = value.to_bool() {
            FieldValue::Bool(b)
        } else if let Some(i) = value.to_i64() {
            FieldValue::Int(i)
        } else if let Some(u) = value.to_u64() {
            FieldValue::Uint(u)
        } else if let Some(f) = value.to_f64() {
            FieldValue::Float(f)
        } else {
            FieldValue::Str(value.to_string())
        };
        self.0.push(Field::new(key.as_str(), value));
        Ok(())
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        current().enabled(metadata.level().into())
    }

    fn log(&self, record: &log::Record) {
        let logger = current();
        let level = Level::from(record.level());
        if !logger.enabled(level) {
            return;
        }

        let mut fields = FieldCollector(Vec::new());
        // a failing visitor only loses the remaining key-values
        let _ = record.key_values().visit(&mut fields);

        let record = LogRecord::new(level, record.args().to_string())
            .with_logger_name(record.target())
            .with_fields(fields.0);
        logger.emit(record);
    }

    fn flush(&self) {
        let _ = current().flush();
    }
}

/// Routes the `log` macros through the global registry. The `log` target
/// becomes the logger name, so `target: SUCCESS_NAME` prints a success line.
pub fn init_log_bridge() -> eyre::Result<()> {
    log::set_boxed_logger(Box::new(LogBridge)).context("Failed registering log bridge")?;
    log::set_max_level(LevelFilter::Trace);
    Ok(())
}
