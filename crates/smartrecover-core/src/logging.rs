//! Logging initialization and sensitive-value redaction.
//!
//! Builds the tracing subscriber from [`LoggingConfig`]: a reloadable level
//! filter, a console layer (human or JSON), optional function entry/exit
//! span events, and an optional size-rotating file sink. The returned
//! [`LoggingHandle`] lets the admin surface change the level at runtime.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Substrings that mark a field name as sensitive.
const SENSITIVE_KEY_PATTERNS: &[&str] = &["api_key", "token", "password", "secret"];

/// Whether a field name matches the sensitive-name pattern list.
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_PATTERNS.iter().any(|p| key.contains(p))
}

/// Mask a value when its key is sensitive. Returns `None` for keys that are
/// safe to log verbatim.
pub fn redact_if_sensitive(key: &str, value: &str) -> Option<String> {
    if !is_sensitive_key(key) {
        return None;
    }
    if value.is_empty() {
        Some(String::new())
    } else {
        Some("***".to_string())
    }
}

/// Handle for runtime logging mutations.
#[derive(Clone)]
pub struct LoggingHandle {
    reload: reload::Handle<EnvFilter, Registry>,
}

impl LoggingHandle {
    /// Swap the active level filter.
    pub fn set_level(&self, level: &str) -> Result<()> {
        let directive = level_directive(level)?;
        self.reload
            .reload(EnvFilter::new(directive))
            .map_err(|e| Error::config(format!("failed to reload log filter: {e}")))?;
        info!(level, "Log level updated");
        Ok(())
    }
}

fn level_directive(level: &str) -> Result<&'static str> {
    match level.to_ascii_lowercase().as_str() {
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warning" | "warn" => Ok("warn"),
        "error" | "critical" => Ok("error"),
        other => Err(Error::config(format!("unknown log level: {other}"))),
    }
}

/// Initialize the global subscriber. Call once at startup.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingHandle> {
    let directive = level_directive(&config.level)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let (filter_layer, reload_handle) = reload::Layer::new(filter);

    let span_events = || {
        if config.enable_tracing {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    };

    let writer = match &config.log_file {
        Some(path) => Some(RotatingFileWriter::open(
            path.clone(),
            config.max_bytes,
            config.backup_count,
        )?),
        None => None,
    };

    if config.json {
        let file_layer = writer.map(|w| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(move || w.clone())
        });
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_events(span_events()),
            )
            .with(file_layer)
            .init();
    } else {
        let file_layer = writer.map(|w| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(move || w.clone())
        });
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_span_events(span_events()),
            )
            .with(file_layer)
            .init();
    }

    info!(level = %config.level, tracing = config.enable_tracing, "Logging initialized");
    if config.enable_tracing {
        info!("Function tracing enabled; sensitive arguments are redacted or skipped");
    }

    Ok(LoggingHandle {
        reload: reload_handle,
    })
}

/// A size-rotating log file writer.
///
/// When the active file exceeds `max_bytes`, existing backups shift up
/// (`app.log.1` -> `app.log.2`, ...) with the oldest dropped, and the active
/// file restarts empty as `app.log`.
#[derive(Clone)]
pub struct RotatingFileWriter {
    inner: Arc<Mutex<RotatingFileState>>,
}

struct RotatingFileState {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    backup_count: usize,
}

impl RotatingFileWriter {
    pub fn open(path: PathBuf, max_bytes: u64, backup_count: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            inner: Arc::new(Mutex::new(RotatingFileState {
                path,
                file,
                written,
                max_bytes,
                backup_count,
            })),
        })
    }
}

impl RotatingFileState {
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backup_count == 0 {
            // No backups kept: truncate in place.
            self.file = File::create(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        let backup = |n: usize| -> PathBuf {
            let mut p = self.path.as_os_str().to_owned();
            p.push(format!(".{n}"));
            PathBuf::from(p)
        };

        let _ = std::fs::remove_file(backup(self.backup_count));
        for n in (1..self.backup_count).rev() {
            let _ = std::fs::rename(backup(n), backup(n + 1));
        }
        let _ = std::fs::rename(&self.path, backup(1));

        self.file = File::create(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.inner.lock().expect("log writer lock poisoned");
        if state.max_bytes > 0 && state.written + buf.len() as u64 > state.max_bytes {
            state.rotate()?;
        }
        let n = state.file.write(buf)?;
        state.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.inner.lock().expect("log writer lock poisoned");
        state.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sensitive_keys_match_pattern_list() {
        assert!(is_sensitive_key("api_key"));
        assert!(is_sensitive_key("openai_api_key"));
        assert!(is_sensitive_key("client_secret"));
        assert!(is_sensitive_key("PASSWORD"));
        assert!(is_sensitive_key("jira_api_token"));
        assert!(!is_sensitive_key("model"));
        assert!(!is_sensitive_key("base_url"));
    }

    #[test]
    fn redaction_masks_only_sensitive_values() {
        assert_eq!(redact_if_sensitive("api_key", "sk-abc"), Some("***".into()));
        assert_eq!(redact_if_sensitive("model", "gpt-4"), None);
        assert_eq!(redact_if_sensitive("password", ""), Some(String::new()));
    }

    #[test]
    fn writer_rotates_at_size_threshold() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut writer = RotatingFileWriter::open(path.clone(), 32, 2).unwrap();

        writer.write_all(b"0123456789012345678901234567").unwrap(); // 28 bytes
        writer.write_all(b"next line that forces rotation").unwrap();
        writer.flush().unwrap();

        assert!(path.exists());
        assert!(dir.path().join("app.log.1").exists());
        let rotated = std::fs::read_to_string(dir.path().join("app.log.1")).unwrap();
        assert!(rotated.starts_with("0123"));
    }

    #[test]
    fn writer_drops_oldest_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut writer = RotatingFileWriter::open(path.clone(), 8, 1).unwrap();

        writer.write_all(b"aaaaaaaa").unwrap();
        writer.write_all(b"bbbbbbbb").unwrap();
        writer.write_all(b"cccccccc").unwrap();
        writer.flush().unwrap();

        assert!(dir.path().join("app.log.1").exists());
        assert!(!dir.path().join("app.log.2").exists());
    }

    #[test]
    fn level_directive_accepts_aliases() {
        assert_eq!(level_directive("warning").unwrap(), "warn");
        assert_eq!(level_directive("critical").unwrap(), "error");
        assert!(level_directive("loud").is_err());
    }
}
