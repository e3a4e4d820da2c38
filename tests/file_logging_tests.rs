use std::{fs, io::Read, sync::Arc};

use clio::logging::{RotatingFile, SharedBuffer, SyncWriter};
use clio::{Builder, FileLoggerConfig, Level, LogRecord, Options, Registry};
use flate2::read::GzDecoder;
use serde_json::Value;

fn registry_with(buffer: &SharedBuffer) -> Registry {
    Registry::new(
        Options::new()
            .with_writer(Arc::new(buffer.clone()))
            .with_no_color(true)
            .with_level(Level::Info),
    )
}

fn json_lines(path: &std::path::Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn file_logging_tees_console_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("app.log");
    let console = SharedBuffer::new();
    let registry = registry_with(&console);

    registry
        .set_file_logging(FileLoggerConfig::new(&path))
        .unwrap();
    registry.current().emit(
        LogRecord::new(Level::Warn, "disk almost full")
            .with_field("free_mb", 12u64)
            .with_field("volume", "/data"),
    );
    registry.current().emit(LogRecord::new(Level::Debug, "filtered everywhere"));
    registry.current().flush().unwrap();

    assert_eq!(
        console.contents_lossy(),
        "[!] disk almost full  free_mb:12\tvolume:/data\n"
    );

    let lines = json_lines(&path);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["level"], "warn");
    assert_eq!(lines[0]["msg"], "disk almost full");
    assert_eq!(lines[0]["free_mb"], 12);
    assert_eq!(lines[0]["volume"], "/data");

    let ts = lines[0]["ts"].as_str().unwrap();
    assert_eq!(ts.len(), "2024-01-01T00:00:00.000Z".len());
    assert!(ts.ends_with('Z'));
}

#[test]
fn file_sink_can_have_its_own_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("debug.log");
    let console = SharedBuffer::new();
    let registry = registry_with(&console);

    registry
        .set_file_logging(FileLoggerConfig::new(&path).with_level(Level::Debug))
        .unwrap();
    registry.current().emit(LogRecord::new(Level::Debug, "only in the file"));

    assert!(console.is_empty());
    let lines = json_lines(&path);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["msg"], "only in the file");
}

#[test]
fn disabling_file_logging_stops_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let console = SharedBuffer::new();
    let registry = registry_with(&console);

    registry
        .set_file_logging(FileLoggerConfig::new(&path))
        .unwrap();
    registry.current().emit(LogRecord::new(Level::Info, "first"));
    registry.disable_file_logging();
    registry.current().emit(LogRecord::new(Level::Info, "second"));

    assert_eq!(json_lines(&path).len(), 1);
    assert_eq!(console.contents_lossy(), "[i] first\n[i] second\n");
}

#[test]
fn unopenable_file_leaves_configuration_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "file").unwrap();

    let console = SharedBuffer::new();
    let registry = registry_with(&console);

    let result = registry.set_file_logging(FileLoggerConfig::new(blocker.join("app.log")));
    assert!(result.is_err());

    registry.current().emit(LogRecord::new(Level::Info, "console still works"));
    assert_eq!(console.contents_lossy(), "[i] console still works\n");
}

#[test]
fn builder_opens_file_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("built.log");

    let logger = Builder::new()
        .with_file_sink(FileLoggerConfig::new(&path))
        .build()
        .unwrap();
    logger.emit(
        LogRecord::new(Level::Error, "boom")
            .with_logger_name("worker")
            .with_stack("at main"),
    );

    let lines = json_lines(&path);
    assert_eq!(lines[0]["logger"], "worker");
    assert_eq!(lines[0]["stacktrace"], "at main");
}

#[test]
fn rotation_moves_full_file_aside() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let file = RotatingFile::open(&FileLoggerConfig::new(&path))
        .unwrap()
        .with_max_bytes(10);

    file.write_line(b"12345\n").unwrap();
    file.write_line(b"abcde\n").unwrap();
    file.flush().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "abcde\n");
    let backups = file.backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "12345\n");
}

#[test]
fn oversized_write_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let file = RotatingFile::open(&FileLoggerConfig::new(dir.path().join("app.log")))
        .unwrap()
        .with_max_bytes(4);

    assert!(file.write_line(b"too long\n").is_err());
    assert!(file.backups().unwrap().is_empty());
}

#[test]
fn rotation_keeps_at_most_max_backups() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let file = RotatingFile::open(&FileLoggerConfig::new(&path).with_max_backups(2))
        .unwrap()
        .with_max_bytes(4);

    for line in ["a1\n", "b2\n", "c3\n", "d4\n", "e5\n"] {
        file.write_line(line.as_bytes()).unwrap();
    }

    let backups = file.backups().unwrap();
    assert_eq!(backups.len(), 2);
    assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "d4\n");
    assert_eq!(fs::read_to_string(&backups[1]).unwrap(), "c3\n");
    assert_eq!(fs::read_to_string(&path).unwrap(), "e5\n");
}

#[test]
fn rotated_backups_are_gzipped_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let file = RotatingFile::open(&FileLoggerConfig::new(&path).with_compress(true))
        .unwrap()
        .with_max_bytes(8);

    file.write_line(b"first\n").unwrap();
    file.write_line(b"second\n").unwrap();

    let backups = file.backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].to_string_lossy().ends_with(".log.gz"));

    let mut contents = String::new();
    GzDecoder::new(fs::File::open(&backups[0]).unwrap())
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, "first\n");
}

#[test]
fn reopening_appends_to_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, "old\n").unwrap();

    let file = RotatingFile::open(&FileLoggerConfig::new(&path)).unwrap();
    file.write_line(b"new\n").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "old\nnew\n");
    assert_eq!(file.path(), path.as_path());
}

#[test]
fn rotation_prunes_backups_past_max_age() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let ancient = dir.path().join("app-2000-01-01T00-00-00.000.log");
    fs::write(&ancient, "from long ago\n").unwrap();

    let file = RotatingFile::open(&FileLoggerConfig::new(&path).with_max_age_days(1))
        .unwrap()
        .with_max_bytes(4);
    file.write_line(b"a1\n").unwrap();
    file.write_line(b"b2\n").unwrap();

    assert!(!ancient.exists());
    let backups = file.backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "a1\n");
}
