// SPDX-License-Identifier: Apache-2.0

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, EucanetdError};

pub const DEFAULT_LOG_ROLL_NUMBER: u32 = 10;
pub const DEFAULT_LOG_MAX_SIZE: u64 = 104857600;

const LOG_TARGETS: [&str; 3] = ["eucanetd", "eucanetd_drivers", "eucanetd_daemon"];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize,
)]
#[repr(usize)]
#[serde(rename_all = "lowercase")]
pub enum EucanetdLogLevel {
    Off = 0,
    Fatal = 1,
    Error = 2,
    Warn = 3,
    Info = 4,
    Debug = 5,
    Trace = 6,
}

impl Default for EucanetdLogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl EucanetdLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }
}

impl From<log::LevelFilter> for EucanetdLogLevel {
    fn from(d: log::LevelFilter) -> Self {
        match d {
            log::LevelFilter::Off => Self::Off,
            log::LevelFilter::Error => Self::Error,
            log::LevelFilter::Warn => Self::Warn,
            log::LevelFilter::Info => Self::Info,
            log::LevelFilter::Debug => Self::Debug,
            log::LevelFilter::Trace => Self::Trace,
        }
    }
}

impl From<EucanetdLogLevel> for log::LevelFilter {
    fn from(v: EucanetdLogLevel) -> Self {
        match v {
            EucanetdLogLevel::Off => Self::Off,
            // The log crate has no fatal level, fatal records are errors.
            EucanetdLogLevel::Fatal => Self::Error,
            EucanetdLogLevel::Error => Self::Error,
            EucanetdLogLevel::Warn => Self::Warn,
            EucanetdLogLevel::Info => Self::Info,
            EucanetdLogLevel::Debug => Self::Debug,
            EucanetdLogLevel::Trace => Self::Trace,
        }
    }
}

impl std::fmt::Display for EucanetdLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EucanetdLogLevel {
    type Err = EucanetdError;

    fn from_str(s: &str) -> Result<Self, EucanetdError> {
        match s.to_uppercase().as_str() {
            "OFF" => Ok(Self::Off),
            "FATAL" => Ok(Self::Fatal),
            "ERROR" => Ok(Self::Error),
            "WARN" => Ok(Self::Warn),
            "INFO" => Ok(Self::Info),
            "DEBUG" => Ok(Self::Debug),
            "TRACE" | "EXTREME" | "ALL" => Ok(Self::Trace),
            _ => Err(EucanetdError::new(
                ErrorKind::InvalidArgument,
                format!("Invalid logging level {s}"),
            )),
        }
    }
}

/// Log parameters which can be changed without restarting eucanetd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogParams {
    pub level: EucanetdLogLevel,
    pub roll_number: u32,
    pub max_size: u64,
    pub prefix: String,
    pub facility: String,
}

impl Default for LogParams {
    fn default() -> Self {
        Self {
            level: EucanetdLogLevel::Info,
            roll_number: DEFAULT_LOG_ROLL_NUMBER,
            max_size: DEFAULT_LOG_MAX_SIZE,
            prefix: String::new(),
            facility: String::new(),
        }
    }
}

/// Size based rotating log file: `eucanetd.log` is renamed to
/// `eucanetd.log.1` (and older ones shifted up to `roll_number`) once it
/// grows beyond `max_size` bytes.
#[derive(Debug)]
pub struct RotatingLogFile {
    path: PathBuf,
    fd: Option<File>,
    size: u64,
    roll_number: u32,
    max_size: u64,
}

impl RotatingLogFile {
    pub fn open(
        path: &Path,
        roll_number: u32,
        max_size: u64,
    ) -> Result<Self, EucanetdError> {
        let mut ret = Self {
            path: path.to_path_buf(),
            fd: None,
            size: 0,
            roll_number,
            max_size,
        };
        ret.reopen()?;
        Ok(ret)
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn set_limits(&mut self, roll_number: u32, max_size: u64) {
        self.roll_number = roll_number;
        self.max_size = max_size;
    }

    fn reopen(&mut self) -> Result<(), EucanetdError> {
        let fd = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                EucanetdError::new(
                    ErrorKind::DaemonFailure,
                    format!(
                        "Failed to open log file {}: {e}",
                        self.path.display()
                    ),
                )
            })?;
        self.size = fd.metadata().map(|m| m.len()).unwrap_or(0);
        self.fd = Some(fd);
        Ok(())
    }

    fn rolled_path(&self, index: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        self.fd = None;
        if self.roll_number == 0 {
            std::fs::remove_file(&self.path).ok();
        } else {
            for i in (1..self.roll_number).rev() {
                let src = self.rolled_path(i);
                if src.exists() {
                    std::fs::rename(&src, self.rolled_path(i + 1))?;
                }
            }
            std::fs::rename(&self.path, self.rolled_path(1))?;
        }
        self.reopen()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

impl Write for RotatingLogFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.max_size > 0 && self.size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }
        let size = match self.fd.as_mut() {
            Some(fd) => fd.write(buf)?,
            None => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "log file is not opened",
                ))
            }
        };
        self.size += size as u64;
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.fd.as_mut() {
            Some(fd) => fd.flush(),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
struct SharedLogFile(Arc<Mutex<RotatingLogFile>>);

impl Write for SharedLogFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.0.lock() {
            Ok(mut f) => f.write(buf),
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.0.lock() {
            Ok(mut f) => f.flush(),
            Err(_) => Ok(()),
        }
    }
}

/// Handle kept by the daemon to re-apply log parameters whenever the
/// configuration file changes.
#[derive(Debug, Clone, Default)]
pub struct LogController {
    file: Option<Arc<Mutex<RotatingLogFile>>>,
    prefix: Arc<Mutex<String>>,
}

impl LogController {
    pub fn is_file_backed(&self) -> bool {
        self.file.is_some()
    }

    pub fn apply(&self, params: &LogParams) {
        if let Some(file) = self.file.as_ref() {
            if let Ok(mut f) = file.lock() {
                f.set_limits(params.roll_number, params.max_size);
            }
        }
        if let Ok(mut prefix) = self.prefix.lock() {
            prefix.clone_from(&params.prefix);
        }
        log::set_max_level(params.level.into());
    }

    /// Used during pre-flight so that retry noise stays out of the log
    pub fn cap_level(&self, level: EucanetdLogLevel) {
        log::set_max_level(level.into());
    }
}

/// Install the global logger.
///
/// With `log_file` set, records go to the rotating log file at the level
/// of `params`, otherwise to stderr at `term_level`.
pub fn init_logger(
    log_file: Option<&Path>,
    term_level: EucanetdLogLevel,
    params: &LogParams,
) -> Result<LogController, EucanetdError> {
    let mut log_builder = env_logger::Builder::new();
    // Other crates(e.g. nispor) are only interesting on warnings.
    log_builder.filter(None, log::LevelFilter::Warn);
    for target in LOG_TARGETS {
        log_builder.filter(Some(target), log::LevelFilter::Trace);
    }

    let mut controller = LogController {
        file: None,
        prefix: Arc::new(Mutex::new(params.prefix.clone())),
    };
    let prefix = controller.prefix.clone();
    log_builder.format(move |buf, record| {
        let prefix = prefix.lock().map(|p| p.clone()).unwrap_or_default();
        writeln!(
            buf,
            "{}{} {:<5} {}",
            prefix,
            buf.timestamp_seconds(),
            record.level(),
            record.args()
        )
    });

    let level = if let Some(path) = log_file {
        let file = Arc::new(Mutex::new(RotatingLogFile::open(
            path,
            params.roll_number,
            params.max_size,
        )?));
        log_builder.target(env_logger::Target::Pipe(Box::new(
            SharedLogFile(file.clone()),
        )));
        controller.file = Some(file);
        params.level
    } else {
        log_builder.target(env_logger::Target::Stderr);
        term_level
    };

    log_builder.try_init().map_err(|e| {
        EucanetdError::new(
            ErrorKind::DaemonFailure,
            format!("Failed to initialize logger: {e}"),
        )
    })?;
    log::set_max_level(level.into());
    Ok(controller)
}
