use std::{
    io::{self, Write},
    sync::Arc,
};

use eyre::Context;
use parking_lot::Mutex;

use super::{level::Level, record::LogRecord, LevelEnabler, LogEncoder, LogSink, SyncWriter};

/// One writer, one encoder and one threshold.
pub struct Core {
    writer: Arc<dyn SyncWriter>,
    encoder: Box<dyn LogEncoder>,
    threshold: Arc<dyn LevelEnabler>,
}

impl Core {
    pub fn new(
        writer: Arc<dyn SyncWriter>,
        encoder: impl LogEncoder + 'static,
        threshold: impl LevelEnabler + 'static,
    ) -> Self {
        Self {
            writer,
            encoder: Box::new(encoder),
            threshold: Arc::new(threshold),
        }
    }
}

impl LogSink for Core {
    fn enabled(&self, level: Level) -> bool {
        self.threshold.enabled(level)
    }

    fn write_log(&self, record: &LogRecord) -> eyre::Result<()> {
        let line = self.encoder.encode(record)?;
        self.writer
            .write_line(&line)
            .context("Failed writing log line")
    }

    fn flush(&self) -> eyre::Result<()> {
        self.writer.flush().context("Can't flush log writer")
    }
}

/// Fans each record out to every member sink whose threshold it passes.
///
/// The member list is fixed at construction. A failing member does not stop
/// delivery to the others; failures are reported together afterwards.
pub struct Tee {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl Tee {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }

    fn collect(&self, failures: Vec<eyre::Report>, action: &str) -> eyre::Result<()> {
        let failed = failures.len();
        match failures.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(first.wrap_err(format!(
                "{} of {} sinks failed to {}",
                failed,
                self.sinks.len(),
                action
            ))),
        }
    }
}

impl LogSink for Tee {
    fn enabled(&self, level: Level) -> bool {
        self.sinks.iter().any(|sink| sink.enabled(level))
    }

    fn write_log(&self, record: &LogRecord) -> eyre::Result<()> {
        let failures: Vec<_> = self
            .sinks
            .iter()
            .filter(|sink| sink.enabled(record.level()))
            .filter_map(|sink| sink.write_log(record).err())
            .collect();

        self.collect(failures, "write")
    }

    fn flush(&self) -> eyre::Result<()> {
        let failures: Vec<_> = self
            .sinks
            .iter()
            .filter_map(|sink| sink.flush().err())
            .collect();

        self.collect(failures, "flush")
    }
}

pub struct NullSink {}

impl NullSink {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for NullSink {
    fn enabled(&self, _level: Level) -> bool {
        false
    }

    fn write_log(&self, _record: &LogRecord) -> eyre::Result<()> {
        Ok(())
    }

    fn flush(&self) -> eyre::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StderrWriter;

impl SyncWriter for StderrWriter {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        io::stderr().lock().write_all(line)
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().lock().flush()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutWriter;

impl SyncWriter for StdoutWriter {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut handle = io::stdout().lock();
        handle.write_all(line)?;
        handle.flush()
    }

    fn flush(&self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

/// Serializes access to any [`Write`] so it can be shared by sinks.
pub struct LockedWriter<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> LockedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl<W: Write + Send> SyncWriter for LockedWriter<W> {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        self.inner.lock().write_all(line)
    }

    fn flush(&self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// In-memory writer whose clones all append to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.bytes.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }
}

impl SyncWriter for SharedBuffer {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        self.bytes.lock().extend_from_slice(line);
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}
