//! Logging setup for binaries.
//!
//! Libraries only emit `tracing` events; a binary calls [`init_logging`] once
//! to install a subscriber writing to stderr and, optionally, to a log file.
//! Console and file carry their own filters, so the file can keep debug
//! detail while the console stays at the configured level. The file rotates
//! by size into `<name>.1` .. `<name>.N`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("failed to open log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("a global logger is already installed")]
    AlreadyInstalled,
}

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Console filter used when `RUST_LOG` is unset, e.g. `info` or
    /// `ladder_core=debug`.
    pub level: String,
    /// File filter; independent of `RUST_LOG`.
    pub file_level: String,
    /// Directory for the log file; no file logging when `None`.
    pub log_dir: Option<PathBuf>,
    pub file_name: String,
    /// Rotate once the active file would grow past this many bytes.
    pub max_file_bytes: u64,
    /// Rotated files kept next to the active one.
    pub max_backups: usize,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file_level: "debug".into(),
            log_dir: None,
            file_name: "ladder.log".into(),
            max_file_bytes: 5 * 1024 * 1024,
            max_backups: 5,
        }
    }
}

/// Keeps track of where file logs go.
#[derive(Debug, Clone, Default)]
pub struct LoggingHandle {
    file: Option<PathBuf>,
}

impl LoggingHandle {
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

/// `RUST_LOG` when set, otherwise `default_level`.
pub fn build_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    parse_filter(default_level)
}

fn parse_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|e| LoggingError::Filter {
        filter: directives.to_string(),
        reason: e.to_string(),
    })
}

/// Append-mode log file that rolls over by size.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    max_backups: usize,
}

impl RotatingFile {
    /// Open (creating the directory if needed) and continue an existing file.
    pub fn open(
        dir: &Path,
        name: &str,
        max_bytes: u64,
        max_backups: usize,
    ) -> Result<Self, LoggingError> {
        let path = dir.join(name);
        let file_err = |source| LoggingError::File {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(dir).map_err(file_err)?;
        let file = open_append(&path).map_err(file_err)?;
        let written = file.metadata().map_err(file_err)?.len();
        Ok(Self {
            path,
            file,
            written,
            max_bytes,
            max_backups,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup(&self, n: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.max_backups == 0 {
            self.file = File::create(&self.path)?;
        } else {
            for n in (1..self.max_backups).rev() {
                let from = self.backup(n);
                if from.exists() {
                    fs::rename(&from, self.backup(n + 1))?;
                }
            }
            fs::rename(&self.path, self.backup(1))?;
            self.file = open_append(&self.path)?;
        }
        self.written = 0;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Install the global subscriber.
pub fn init_logging(opts: &LoggingOptions) -> Result<LoggingHandle, LoggingError> {
    let console_filter = build_filter(&opts.level)?;

    let (file_path, file_layer) = match &opts.log_dir {
        Some(dir) => {
            let file = RotatingFile::open(
                dir,
                &opts.file_name,
                opts.max_file_bytes,
                opts.max_backups,
            )?;
            let path = file.path().to_path_buf();
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file))
                .with_filter(parse_filter(&opts.file_level)?);
            (Some(path), Some(layer))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_filter(console_filter))
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)?;

    if let Some(path) = &file_path {
        tracing::debug!(path = %path.display(), "file logging enabled");
    }
    Ok(LoggingHandle { file: file_path })
}
