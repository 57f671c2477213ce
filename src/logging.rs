//! Process-wide logging: a console layer plus a file layer that rolls over to a
//! new file by size or at a daily boundary, whichever comes first.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::collision::resolve_collision;
use crate::error::{Error, Result};
use crate::paths::ensure_directory;

pub const DEFAULT_LOG_DIR: &str = "LOGS";
pub const DEFAULT_MAX_BYTES: u64 = 500_000_000;

const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S_%6f";

/// Parse `"INFO"`, `"debug"`, `"off"` and friends.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| Error::InvalidArgument(format!("unknown log level: {:?}", level)))
}

fn local_at(date: NaiveDate, at: NaiveTime) -> DateTime<Local> {
    let naive = date.and_time(at);
    // A wall-clock time skipped by a DST jump falls back to its UTC reading.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

/// Decides when the active log file is closed and a new one opened.
///
/// State is the next scheduled boundary; crossing it advances the boundary by
/// whole days until it lies after the message that crossed it.
#[derive(Debug, Clone)]
pub struct Rotator {
    size_limit: u64,
    next_rotation: DateTime<Local>,
}

impl Rotator {
    pub fn new(size_limit: u64, at: NaiveTime, now: DateTime<Local>) -> Self {
        let mut next_rotation = local_at(now.date_naive(), at);
        if now >= next_rotation {
            next_rotation = next_rotation + Duration::days(1);
        }
        Rotator { size_limit, next_rotation }
    }

    pub fn next_rotation(&self) -> DateTime<Local> {
        self.next_rotation
    }

    /// True when writing `pending_size` more bytes at `current_offset` would
    /// pass the size limit, or when `message_time` is past the boundary.
    /// An empty file never rotates on size.
    pub fn should_rotate(&mut self, pending_size: u64, current_offset: u64, message_time: DateTime<Local>) -> bool {
        let crossed = message_time > self.next_rotation;
        while self.next_rotation < message_time {
            self.next_rotation = self.next_rotation + Duration::days(1);
        }
        let too_big = current_offset > 0 && current_offset.saturating_add(pending_size) > self.size_limit;
        crossed || too_big
    }
}

/// Appends to `<dir>/<name>_<timestamp>.log`, switching to a fresh file
/// whenever the [`Rotator`] says so.
#[derive(Debug)]
pub struct RotatingFileWriter {
    dir: PathBuf,
    name: String,
    rotator: Rotator,
    file: File,
    path: PathBuf,
    offset: u64,
}

impl RotatingFileWriter {
    pub fn open(dir: &Path, name: &str, rotator: Rotator) -> Result<Self> {
        ensure_directory(dir)?;
        let (file, path) = open_log_file(dir, name, Local::now())?;
        Ok(RotatingFileWriter { dir: dir.to_path_buf(), name: name.to_string(), rotator, file, path, offset: 0 })
    }

    /// File currently being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rotate(&mut self, now: DateTime<Local>) -> io::Result<()> {
        self.file.flush()?;
        let (file, path) = open_log_file(&self.dir, &self.name, now)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        self.file = file;
        self.path = path;
        self.offset = 0;
        Ok(())
    }

    fn write_at(&mut self, buf: &[u8], now: DateTime<Local>) -> io::Result<usize> {
        if self.rotator.should_rotate(buf.len() as u64, self.offset, now) {
            self.rotate(now)?;
        }
        self.file.write_all(buf)?;
        self.offset += buf.len() as u64;
        Ok(buf.len())
    }
}

fn open_log_file(dir: &Path, name: &str, now: DateTime<Local>) -> Result<(File, PathBuf)> {
    let candidate = dir.join(format!("{}_{}.log", name, now.format(FILE_TIMESTAMP_FORMAT)));
    let path = resolve_collision(&candidate)?;
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_at(buf, Local::now())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Everything [`configure_logging`] needs; the fields default to a `LOGS`
/// directory, 500 MB files and rotation at local midnight.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub name: String,
    pub console_level: LevelFilter,
    pub file_level: LevelFilter,
    pub directory: PathBuf,
    pub max_bytes: u64,
    pub rotate_at: NaiveTime,
}

impl LogSettings {
    pub fn new(name: &str, console_level: &str, file_level: &str) -> Result<Self> {
        Ok(LogSettings {
            name: name.to_string(),
            console_level: parse_level(console_level)?,
            file_level: parse_level(file_level)?,
            directory: PathBuf::from(DEFAULT_LOG_DIR),
            max_bytes: DEFAULT_MAX_BYTES,
            rotate_at: NaiveTime::default(),
        })
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Install the global subscriber. Returns the first log file's path.
    pub fn install(self) -> Result<PathBuf> {
        let rotator = Rotator::new(self.max_bytes, self.rotate_at, Local::now());
        let writer = RotatingFileWriter::open(&self.directory, &self.name, rotator)?;
        let path = writer.path().to_path_buf();

        let console = fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .without_time()
            .with_filter(self.console_level);
        let file = fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(writer))
            .with_filter(self.file_level);
        tracing_subscriber::registry()
            .with(console)
            .with(file)
            .try_init()
            .map_err(|e| Error::Logging(e.to_string()))?;
        Ok(path)
    }
}

/// Console output at `console_level`, file output at `file_level` under
/// `./LOGS`. Call once at startup.
pub fn configure_logging(name: &str, console_level: &str, file_level: &str) -> Result<PathBuf> {
    LogSettings::new(name, console_level, file_level)?.install()
}
