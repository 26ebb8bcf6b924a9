//! Rolling Logger
//!
//! Process-wide `tracing` subscriber writing to a size-capped log file that
//! rotates into numbered backups, plus a circular buffer of the most recent
//! lines for in-app diagnostics. `log` records are bridged into `tracing`.

use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

static GLOBAL_WRITER: OnceLock<RollingWriter> = OnceLock::new();

// ========================
// Errors
// ========================

#[derive(Debug)]
pub enum LoggerError {
    Io(io::Error),
    AlreadyInitialized,
    NotInitialized,
}

impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggerError::Io(e) => write!(f, "Log file error: {}", e),
            LoggerError::AlreadyInitialized => write!(f, "Logger already initialized"),
            LoggerError::NotInitialized => write!(f, "Logger not initialized"),
        }
    }
}

impl std::error::Error for LoggerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoggerError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LoggerError {
    fn from(e: io::Error) -> Self {
        LoggerError::Io(e)
    }
}

// ========================
// Configuration
// ========================

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Rotate once the active file would grow past this many bytes
    pub max_bytes: u64,
    /// Number of rotated files kept next to the active one
    pub max_files: usize,
    /// Lines kept in the in-memory circular buffer
    pub recent_capacity: usize,
    pub level: LevelFilter,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
            max_files: 3,
            recent_capacity: 200,
            level: LevelFilter::INFO,
        }
    }
}

// ========================
// Rolling writer
// ========================

struct RollingFile {
    path: PathBuf,
    max_bytes: u64,
    max_files: usize,
    file: Option<File>,
    written: u64,
    recent: VecDeque<String>,
    recent_capacity: usize,
}

impl RollingFile {
    fn open(path: PathBuf, config: &LoggerConfig) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes: config.max_bytes,
            max_files: config.max_files,
            file: Some(file),
            written,
            recent: VecDeque::with_capacity(config.recent_capacity),
            recent_capacity: config.recent_capacity,
        })
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;
        if self.max_files == 0 {
            fs::remove_file(&self.path)?;
        } else {
            let oldest = self.backup_path(self.max_files);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for n in (1..self.max_files).rev() {
                let from = self.backup_path(n);
                if from.exists() {
                    fs::rename(&from, self.backup_path(n + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
        }
        self.file = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        self.written = 0;
        Ok(())
    }

    fn remember(&mut self, buf: &[u8]) {
        if self.recent_capacity == 0 {
            return;
        }
        for line in String::from_utf8_lossy(buf).lines() {
            if line.is_empty() {
                continue;
            }
            if self.recent.len() == self.recent_capacity {
                self.recent.pop_front();
            }
            self.recent.push_back(line.to_string());
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Err(io::Error::new(io::ErrorKind::Other, "log file closed")),
        };
        file.write_all(buf)?;
        self.written += buf.len() as u64;
        self.remember(buf);
        Ok(buf.len())
    }
}

/// Cloneable handle to the rolling log file; each clone writes to the same file
#[derive(Clone)]
pub struct RollingWriter {
    inner: Arc<Mutex<RollingFile>>,
}

impl RollingWriter {
    pub fn new(path: impl Into<PathBuf>, config: &LoggerConfig) -> Result<Self, LoggerError> {
        let file = RollingFile::open(path.into(), config)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }

    /// Most recent lines, oldest first
    pub fn recent_lines(&self) -> Vec<String> {
        match self.inner.lock() {
            Ok(inner) => inner.recent.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().recent.iter().cloned().collect(),
        }
    }

    pub fn path(&self) -> PathBuf {
        match self.inner.lock() {
            Ok(inner) => inner.path.clone(),
            Err(poisoned) => poisoned.into_inner().path.clone(),
        }
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;
        inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;
        match inner.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Local wall-clock timestamps, `HH:MM:SS.mmm`
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

// ========================
// Global logger
// ========================

/// Install the rolling logger as the global subscriber, logging to
/// `<log_dir>/<app_name>.log`.
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), LoggerError> {
    init_logger_with(log_dir, app_name, LoggerConfig::default())
}

pub fn init_logger_with(
    log_dir: impl AsRef<Path>,
    app_name: &str,
    config: LoggerConfig,
) -> Result<(), LoggerError> {
    if GLOBAL_WRITER.get().is_some() {
        return Err(LoggerError::AlreadyInitialized);
    }
    let log_dir = log_dir.as_ref();
    fs::create_dir_all(log_dir)?;
    let writer = RollingWriter::new(log_dir.join(format!("{}.log", app_name)), &config)?;

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer.clone())
        .with_ansi(false)
        .with_target(false)
        .with_timer(LocalTime)
        .with_filter(config.level);

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    GLOBAL_WRITER
        .set(writer)
        .map_err(|_| LoggerError::AlreadyInitialized)?;
    log::info!("{} logger started", app_name);
    Ok(())
}

/// Recent lines from the global logger, oldest first
pub fn recent_lines() -> Vec<String> {
    GLOBAL_WRITER
        .get()
        .map(RollingWriter::recent_lines)
        .unwrap_or_default()
}

pub fn info(msg: &str) -> Result<(), LoggerError> {
    if GLOBAL_WRITER.get().is_none() {
        return Err(LoggerError::NotInitialized);
    }
    tracing::info!("{}", msg);
    Ok(())
}

pub fn error(msg: &str) -> Result<(), LoggerError> {
    if GLOBAL_WRITER.get().is_none() {
        return Err(LoggerError::NotInitialized);
    }
    tracing::error!("{}", msg);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> LoggerConfig {
        LoggerConfig {
            max_bytes: 32,
            max_files: 2,
            recent_capacity: 3,
            level: LevelFilter::INFO,
        }
    }

    #[test]
    fn test_rotates_when_file_is_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut writer = RollingWriter::new(&path, &small_config()).unwrap();

        writer.write_all(b"first line of twenty\n").unwrap();
        writer.write_all(b"second line of twenty\n").unwrap();
        writer.write_all(b"third line of twenty\n").unwrap();
        writer.flush().unwrap();

        let active = fs::read_to_string(&path).unwrap();
        assert_eq!(active, "third line of twenty\n");
        let first_backup = fs::read_to_string(dir.path().join("app.log.1")).unwrap();
        assert_eq!(first_backup, "second line of twenty\n");
        let second_backup = fs::read_to_string(dir.path().join("app.log.2")).unwrap();
        assert_eq!(second_backup, "first line of twenty\n");
    }

    #[test]
    fn test_keeps_at_most_max_files_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut writer = RollingWriter::new(&path, &small_config()).unwrap();

        for i in 0..6 {
            writer
                .write_all(format!("line number {} padded out\n", i).as_bytes())
                .unwrap();
        }

        assert!(dir.path().join("app.log.1").exists());
        assert!(dir.path().join("app.log.2").exists());
        assert!(!dir.path().join("app.log.3").exists());
    }

    #[test]
    fn test_recent_lines_is_circular() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingWriter::new(dir.path().join("app.log"), &small_config()).unwrap();

        writer.write_all(b"a\nb\n").unwrap();
        writer.write_all(b"c\n").unwrap();
        writer.write_all(b"d\n").unwrap();

        assert_eq!(writer.recent_lines(), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "old\n").unwrap();

        let mut writer = RollingWriter::new(&path, &LoggerConfig::default()).unwrap();
        writer.write_all(b"new\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "old\nnew\n");
    }

    // The only test in this crate that touches the global logger
    #[test]
    fn test_global_logger_lifecycle() {
        assert!(matches!(info("hello"), Err(LoggerError::NotInitialized)));
        assert!(matches!(error("hello"), Err(LoggerError::NotInitialized)));
        assert!(recent_lines().is_empty());

        let dir = tempfile::tempdir().unwrap();
        init_logger(dir.path(), "app").unwrap();
        info("hello").unwrap();
        assert!(recent_lines().iter().any(|line| line.contains("hello")));
        assert!(dir.path().join("app.log").exists());

        assert!(matches!(
            init_logger(dir.path(), "app"),
            Err(LoggerError::AlreadyInitialized)
        ));
    }
}
