//! Rolling Logger
//!
//! Daily log files plus an in-memory buffer of recent lines for an in-app
//! log view. Records from the `log` facade are captured as well.
//!
//! ```ignore
//! rolling_logger::init_logger(log_dir, "PomManager")?;
//! log::info!("ready");
//! let tail = rolling_logger::recent_lines(50);
//! ```

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, OnceLock};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log files kept per application
pub const MAX_LOG_FILES: usize = 7;

/// Lines kept in memory
pub const RECENT_CAPACITY: usize = 1000;

static RECENT: LazyLock<Mutex<RingBuffer>> = LazyLock::new(|| Mutex::new(RingBuffer::new(RECENT_CAPACITY)));

static LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fixed-capacity line buffer, oldest lines dropped first
#[derive(Debug)]
pub struct RingBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { lines: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Last `n` lines, oldest first
    pub fn tail(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Current day's file, reopened when the date changes
struct LogFile {
    dir: PathBuf,
    prefix: String,
    date: String,
    file: Option<File>,
}

impl LogFile {
    fn new(dir: PathBuf, prefix: &str) -> Self {
        Self { dir, prefix: prefix.to_string(), date: String::new(), file: None }
    }

    fn path_for(&self, date: &str) -> PathBuf {
        self.dir.join(format!("{}.{}.log", self.prefix, date))
    }

    fn current(&mut self) -> io::Result<&mut File> {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        if self.file.is_none() || self.date != today {
            let file = OpenOptions::new().create(true).append(true).open(self.path_for(&today))?;
            self.file = Some(file);
            self.date = today;
            prune(&self.dir, &self.prefix, MAX_LOG_FILES)?;
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file not open"))
    }
}

/// Remove all but the newest `keep` files of `prefix` (dates sort by name)
fn prune(dir: &Path, prefix: &str, keep: usize) -> io::Result<()> {
    let head = format!("{}.", prefix);
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&head) && n.ends_with(".log"))
        })
        .collect();

    if files.len() <= keep {
        return Ok(());
    }
    files.sort();
    let excess = files.len() - keep;
    for old in files.into_iter().take(excess) {
        fs::remove_file(old)?;
    }
    Ok(())
}

/// `MakeWriter` that appends to the daily file and mirrors into [`RECENT`]
#[derive(Clone)]
struct RollingWriter {
    file: Arc<Mutex<LogFile>>,
}

struct RollingHandle {
    file: Arc<Mutex<LogFile>>,
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = RollingHandle;

    fn make_writer(&'a self) -> Self::Writer {
        RollingHandle { file: Arc::clone(&self.file) }
    }
}

impl Write for RollingHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        {
            let mut recent = lock(&RECENT);
            for line in String::from_utf8_lossy(buf).lines().filter(|l| !l.trim().is_empty()) {
                recent.push(line.to_string());
            }
        }
        let mut log_file = lock(&self.file);
        log_file.current()?.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut log_file = lock(&self.file);
        match log_file.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Install the global logger writing to `<dir>/<app_name>.<date>.log`.
/// Level comes from `RUST_LOG`, default `info`.
pub fn init_logger(dir: impl AsRef<Path>, app_name: &str) -> Result<(), String> {
    let dir = dir.as_ref().to_path_buf();
    fs::create_dir_all(&dir).map_err(|e| format!("Failed to create log dir {}: {}", dir.display(), e))?;

    let writer = RollingWriter { file: Arc::new(Mutex::new(LogFile::new(dir.clone(), app_name))) };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .map_err(|e| format!("Failed to install logger: {}", e))?;

    let _ = LOG_DIR.set(dir);
    tracing::info!("Logger initialized for {}", app_name);
    Ok(())
}

/// Directory passed to [`init_logger`], if it ran
pub fn log_dir() -> Option<PathBuf> {
    LOG_DIR.get().cloned()
}

fn ensure_initialized() -> Result<(), String> {
    match LOG_DIR.get() {
        Some(_) => Ok(()),
        None => Err("Logger not initialized".to_string()),
    }
}

pub fn info(message: &str) -> Result<(), String> {
    ensure_initialized()?;
    tracing::info!("{}", message);
    Ok(())
}

pub fn warn(message: &str) -> Result<(), String> {
    ensure_initialized()?;
    tracing::warn!("{}", message);
    Ok(())
}

pub fn error(message: &str) -> Result<(), String> {
    ensure_initialized()?;
    tracing::error!("{}", message);
    Ok(())
}

/// Last `n` formatted lines, oldest first
pub fn recent_lines(n: usize) -> Vec<String> {
    lock(&RECENT).tail(n)
}
