use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, Utc};
use eyre::Context;
use flate2::{write::GzEncoder, Compression};
use parking_lot::Mutex;

use super::{level::Level, SyncWriter};
use crate::utils::{format_backup_timestamp, parse_backup_timestamp};

const DEFAULT_MAX_SIZE_MB: u64 = 1;
const DEFAULT_MAX_BACKUPS: usize = 30;
const DEFAULT_MAX_AGE_DAYS: u64 = 90;
const MEGABYTE: u64 = 1024 * 1024;
const COMPRESSED_SUFFIX: &str = ".gz";

/// Where and how to keep the JSON log file. Zero numeric values fall back to
/// the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct FileLoggerConfig {
    pub filename: PathBuf,
    pub max_size_mb: u64,
    pub max_backups: usize,
    pub max_age_days: u64,
    pub compress: bool,
    /// Threshold for the file sink. `None` follows the shared level.
    pub level: Option<Level>,
}

impl FileLoggerConfig {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            max_size_mb: 0,
            max_backups: 0,
            max_age_days: 0,
            compress: false,
            level: None,
        }
    }

    pub fn with_max_size_mb(self, max_size_mb: u64) -> Self {
        Self {
            max_size_mb,
            ..self
        }
    }

    pub fn with_max_backups(self, max_backups: usize) -> Self {
        Self {
            max_backups,
            ..self
        }
    }

    pub fn with_max_age_days(self, max_age_days: u64) -> Self {
        Self {
            max_age_days,
            ..self
        }
    }

    pub fn with_compress(self, compress: bool) -> Self {
        Self { compress, ..self }
    }

    pub fn with_level(self, level: Level) -> Self {
        Self {
            level: Some(level),
            ..self
        }
    }

    pub fn max_size_bytes(&self) -> u64 {
        let mb = if self.max_size_mb == 0 {
            DEFAULT_MAX_SIZE_MB
        } else {
            self.max_size_mb
        };
        mb.saturating_mul(MEGABYTE)
    }

    pub fn effective_max_backups(&self) -> usize {
        if self.max_backups == 0 {
            DEFAULT_MAX_BACKUPS
        } else {
            self.max_backups
        }
    }

    pub fn effective_max_age_days(&self) -> u64 {
        if self.max_age_days == 0 {
            DEFAULT_MAX_AGE_DAYS
        } else {
            self.max_age_days
        }
    }
}

struct State {
    file: Option<File>,
    size: u64,
    last_backup: Option<DateTime<Utc>>,
}

struct Backup {
    path: PathBuf,
    time: DateTime<Utc>,
    compressed: bool,
}

/// Append-only file that rolls over to a timestamped backup once it would
/// grow past its size limit.
pub struct RotatingFile {
    state: Mutex<State>,
    path: PathBuf,
    max_bytes: u64,
    max_backups: usize,
    max_age: Option<Duration>,
    compress: bool,
}

impl RotatingFile {
    pub fn open(config: &FileLoggerConfig) -> eyre::Result<Self> {
        let path = config.filename.clone();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed creating log directory {}", parent.display()))?;
        }

        let file = open_append(&path)
            .with_context(|| format!("Failed opening or creating log file {}", path.display()))?;
        let size = file
            .metadata()
            .with_context(|| format!("Can't read metadata of {}", path.display()))?
            .len();

        let max_age = i64::try_from(config.effective_max_age_days())
            .ok()
            .and_then(Duration::try_days);

        Ok(Self {
            state: Mutex::new(State {
                file: Some(file),
                size,
                last_backup: None,
            }),
            path,
            max_bytes: config.max_size_bytes(),
            max_backups: config.effective_max_backups(),
            max_age,
            compress: config.compress,
        })
    }

    /// Overrides the size limit with an exact byte count.
    pub fn with_max_bytes(self, max_bytes: u64) -> Self {
        Self { max_bytes, ..self }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rotated backups of this file, newest first.
    pub fn backups(&self) -> io::Result<Vec<PathBuf>> {
        Ok(self.list_backups()?.into_iter().map(|b| b.path).collect())
    }

    /// Moves the current file aside and starts a new one.
    pub fn rotate(&self) -> io::Result<()> {
        let mut state = self.state.lock();
        self.rotate_locked(&mut state)
    }

    fn rotate_locked(&self, state: &mut State) -> io::Result<()> {
        if let Some(mut file) = state.file.take() {
            file.flush()?;
        }

        // backup names sort by time, so they must never go backwards
        let now = match state.last_backup {
            Some(last) if last >= Utc::now() => last + Duration::milliseconds(1),
            _ => Utc::now(),
        };
        let (backup, time) = self.backup_path(now);
        if let Err(err) = fs::rename(&self.path, &backup) {
            if err.kind() != io::ErrorKind::NotFound {
                state.file = Some(open_append(&self.path)?);
                return Err(err);
            }
        }

        state.file = Some(open_append(&self.path)?);
        state.size = 0;
        state.last_backup = Some(time);

        // pruning failures leave extra backups behind but never lose the
        // active file
        let _ = self.mill();
        Ok(())
    }

    fn name_parts(&self) -> (String, String) {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (stem, ext)
    }

    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn backup_path(&self, time: DateTime<Utc>) -> (PathBuf, DateTime<Utc>) {
        let (stem, ext) = self.name_parts();
        let dir = self.directory();

        let mut time = time;
        loop {
            let name = format!("{}-{}{}", stem, format_backup_timestamp(time), ext);
            let candidate = dir.join(&name);
            let compressed = dir.join(format!("{}{}", name, COMPRESSED_SUFFIX));
            if !candidate.exists() && !compressed.exists() {
                return (candidate, time);
            }
            time += Duration::milliseconds(1);
        }
    }

    fn list_backups(&self) -> io::Result<Vec<Backup>> {
        let (stem, ext) = self.name_parts();
        let prefix = format!("{}-", stem);

        let mut backups = Vec::new();
        for entry in fs::read_dir(self.directory())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();

            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let (rest, compressed) = match rest.strip_suffix(COMPRESSED_SUFFIX) {
                Some(rest) => (rest, true),
                None => (rest, false),
            };
            let Some(stamp) = rest.strip_suffix(ext.as_str()) else {
                continue;
            };
            let Some(time) = parse_backup_timestamp(stamp) else {
                continue;
            };

            backups.push(Backup {
                path: entry.path(),
                time,
                compressed,
            });
        }

        backups.sort_by(|a, b| b.time.cmp(&a.time));
        Ok(backups)
    }

    /// Deletes backups past the count or age limit, then compresses the rest
    /// when configured to.
    fn mill(&self) -> io::Result<()> {
        let cutoff = self
            .max_age
            .and_then(|age| Utc::now().checked_sub_signed(age));
        let mut remaining = Vec::new();

        for (i, backup) in self.list_backups()?.into_iter().enumerate() {
            if i >= self.max_backups || cutoff.is_some_and(|cutoff| backup.time < cutoff) {
                fs::remove_file(&backup.path)?;
            } else {
                remaining.push(backup);
            }
        }

        if self.compress {
            for backup in remaining.iter().filter(|b| !b.compressed) {
                compress_file(&backup.path)?;
            }
        }

        Ok(())
    }
}

impl SyncWriter for RotatingFile {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let len = line.len() as u64;
        if len > self.max_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "write length {} exceeds maximum file size {}",
                    len, self.max_bytes
                ),
            ));
        }

        let mut state = self.state.lock();
        if state.file.is_none() || state.size + len > self.max_bytes {
            self.rotate_locked(&mut state)?;
        }

        match state.file.as_mut() {
            Some(file) => file.write_all(line)?,
            None => return Err(io::Error::new(io::ErrorKind::NotFound, "log file is closed")),
        }
        state.size += len;
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        match self.state.lock().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn compress_file(path: &Path) -> io::Result<()> {
    let mut target = path.as_os_str().to_owned();
    target.push(COMPRESSED_SUFFIX);

    let mut input = File::open(path)?;
    let mut encoder = GzEncoder::new(File::create(&target)?, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;

    fs::remove_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_take_defaults() {
        let config = FileLoggerConfig::new("app.log");
        assert_eq!(config.max_size_bytes(), MEGABYTE);
        assert_eq!(config.effective_max_backups(), 30);
        assert_eq!(config.effective_max_age_days(), 90);
        assert!(!config.compress);
        assert_eq!(config.level, None);
    }

    #[test]
    fn explicit_values_are_kept() {
        let config = FileLoggerConfig::new("app.log")
            .with_max_size_mb(5)
            .with_max_backups(2)
            .with_max_age_days(7)
            .with_compress(true);
        assert_eq!(config.max_size_bytes(), 5 * MEGABYTE);
        assert_eq!(config.effective_max_backups(), 2);
        assert_eq!(config.effective_max_age_days(), 7);
    }

    #[test]
    fn huge_size_limit_saturates() {
        let config = FileLoggerConfig::new("app.log").with_max_size_mb(u64::MAX);
        assert_eq!(config.max_size_bytes(), u64::MAX);

        let config = FileLoggerConfig::new("app.log").with_max_size_mb(1 << 44);
        assert_eq!(config.max_size_bytes(), u64::MAX);
    }

    #[test]
    fn explicit_rotate_starts_an_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let file = RotatingFile::open(&FileLoggerConfig::new(&path)).unwrap();

        file.write_line(b"before\n").unwrap();
        file.rotate().unwrap();
        file.write_line(b"after\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "after\n");
        let backups = file.backups().unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "before\n");
    }

    #[test]
    fn backup_names_embed_timestamp_before_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = RotatingFile::open(&FileLoggerConfig::new(dir.path().join("app.log"))).unwrap();

        let time = DateTime::parse_from_rfc3339("2024-01-02T03:04:05.006Z")
            .unwrap()
            .with_timezone(&Utc);
        let (path, _) = file.backup_path(time);
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "app-2024-01-02T03-04-05.006.log"
        );
    }

    #[test]
    fn unrelated_files_are_not_backups() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app-notes.log"), "x").unwrap();
        fs::write(dir.path().join("other-2024-01-02T03-04-05.006.log"), "x").unwrap();

        let file = RotatingFile::open(&FileLoggerConfig::new(dir.path().join("app.log"))).unwrap();
        assert!(file.backups().unwrap().is_empty());
    }
}
