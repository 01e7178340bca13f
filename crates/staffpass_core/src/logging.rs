//! Process logging bootstrap and redaction policy.
//!
//! # Responsibility
//! - Start one rolling file logger per process for reader and issuer binaries.
//! - Keep credential material out of log lines: decoded scan text is logged
//!   only as a digest, and free text is scrubbed of token-shaped runs.
//!
//! # Invariants
//! - A repeated init with the same level and directory is a no-op.
//! - A repeated init with another level or directory is an error.
//! - Initialization never panics.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "staffpass";
const ROTATE_AT_BYTES: u64 = 4 * 1024 * 1024;
const KEPT_LOG_FILES: usize = 5;
const MAX_FREE_TEXT_CHARS: usize = 160;
const REDACTED: &str = "<redacted>";

/// Signed codes and legacy payloads are long base64 runs, optionally dotted.
static CREDENTIAL_RUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9_\-+/]{24,}={0,2}(?:\.[A-Za-z0-9_\-+/]{16,}={0,2})?")
        .expect("valid credential regex")
});

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

#[derive(Debug, PartialEq, Eq)]
pub enum LoggingError {
    UnsupportedLevel(String),
    RelativeDir(String),
    CreateDir { dir: PathBuf, message: String },
    Backend(String),
    /// Logging already runs with a different level or directory.
    Conflict { active: String, requested: String },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::RelativeDir(dir) => write!(f, "log dir must be absolute, got `{dir}`"),
            Self::CreateDir { dir, message } => {
                write!(f, "cannot create log dir `{}`: {message}", dir.display())
            }
            Self::Backend(message) => write!(f, "logger backend failed: {message}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logging already active as {active}; refusing {requested}"
            ),
        }
    }
}

impl Error for LoggingError {}

struct ActiveLogger {
    level: &'static str,
    dir: PathBuf,
    _handle: LoggerHandle,
}

impl ActiveLogger {
    fn describe(level: &str, dir: &Path) -> String {
        format!("level={level} dir={}", dir.display())
    }

    fn accept(&self, level: &'static str, dir: &Path) -> Result<(), LoggingError> {
        if self.level == level && self.dir == dir {
            return Ok(());
        }
        Err(LoggingError::Conflict {
            active: Self::describe(self.level, &self.dir),
            requested: Self::describe(level, dir),
        })
    }
}

/// Starts the rolling file logger under `log_dir`.
///
/// # Errors
/// - `UnsupportedLevel` / `RelativeDir` for bad arguments.
/// - `CreateDir` / `Backend` when the logger cannot start.
/// - `Conflict` when logging already runs with other arguments.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let level = parse_level(level)?;
    let dir = absolute_dir(log_dir)?;

    let active = ACTIVE.get_or_try_init(|| start_logger(level, &dir))?;
    active.accept(level, &dir)
}

fn start_logger(level: &'static str, dir: &Path) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(dir).map_err(|err| LoggingError::CreateDir {
        dir: dir.to_path_buf(),
        message: err.to_string(),
    })?;

    let handle = Logger::try_with_str(level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEPT_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    install_panic_hook();
    info!(
        "event=logging_init module=logging status=ok level={level} dir={} version={} debug_build={}",
        dir.display(),
        env!("CARGO_PKG_VERSION"),
        cfg!(debug_assertions)
    );

    Ok(ActiveLogger {
        level,
        dir: dir.to_path_buf(),
        _handle: handle,
    })
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Short stable digest of a decoded scan string.
///
/// Repeats of the same frame share a digest, so reader logs can be
/// correlated without exposing the credential.
pub fn scan_digest(raw: &str) -> String {
    let digest = Sha256::digest(raw.trim().as_bytes());
    let hex: String = digest[..4].iter().map(|byte| format!("{byte:02x}")).collect();
    format!("{hex}/{}", raw.trim().chars().count())
}

/// Single-line, length-capped text with credential-shaped runs masked.
pub fn redact(text: &str) -> String {
    let flattened = text.replace(['\n', '\r'], " ");
    let masked = CREDENTIAL_RUN_RE.replace_all(&flattened, REDACTED);
    let mut capped: String = masked.chars().take(MAX_FREE_TEXT_CHARS).collect();
    if masked.chars().count() > MAX_FREE_TEXT_CHARS {
        capped.push_str("...");
    }
    capped
}

fn parse_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(LoggingError::UnsupportedLevel(other.to_string())),
    }
}

fn absolute_dir(log_dir: &str) -> Result<PathBuf, LoggingError> {
    let path = Path::new(log_dir.trim());
    if log_dir.trim().is_empty() || !path.is_absolute() {
        return Err(LoggingError::RelativeDir(log_dir.trim().to_string()));
    }
    Ok(path.to_path_buf())
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic_captured module=logging status=error location={location} payload={}",
            redact(&payload)
        );
        previous(panic_info);
    }));
}
