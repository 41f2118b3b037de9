//! Append-only diagnostic log
//!
//! Each entry is one `"{timestamp}: {message}\n"` line appended to a plain
//! UTF-8 file. Appends are serialized by a writer lock and each line goes out
//! in a single write, so concurrent writers never interleave partial lines.
//!
//! New lines are also kept in memory until the display layer drains them with
//! [`DiagnosticLog::take_unflushed`], instead of re-reading the file after
//! every write.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Default)]
struct LogState {
    unflushed: Vec<String>,
}

/// File-backed, append-only log sink
#[derive(Debug)]
pub struct DiagnosticLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(LogState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one timestamped line
    pub fn append(&self, message: &str) -> Result<()> {
        let line = format!("{}: {}\n", Local::now().format(TIMESTAMP_FORMAT), message);

        let mut state = self.lock();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to append to log {}", self.path.display()))?;

        state.unflushed.push(line);
        Ok(())
    }

    /// Append, reporting failures to tracing instead of the caller
    pub fn record(&self, message: &str) {
        if let Err(err) = self.append(message) {
            tracing::warn!(path = %self.path.display(), "log append failed: {err:#}");
        }
    }

    /// Lines appended since the last drain, in append order
    pub fn take_unflushed(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().unflushed)
    }

    /// Whole log contents; a log that was never written reads as empty
    pub fn read_all(&self) -> Result<String> {
        let _state = self.lock();
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to read log {}", self.path.display()))
            }
        }
    }

    /// Truncate the log to empty
    pub fn clear(&self) -> Result<()> {
        let mut state = self.lock();
        fs::write(&self.path, "")
            .with_context(|| format!("Failed to clear log {}", self.path.display()))?;
        state.unflushed.clear();
        Ok(())
    }

    /// Byte-for-byte copy of the log, overwriting `destination`
    pub fn export_to(&self, destination: &Path) -> Result<()> {
        let _state = self.lock();
        fs::copy(&self.path, destination).with_context(|| {
            format!(
                "Failed to export log {} to {}",
                self.path.display(),
                destination.display()
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn append_then_read_contains_message() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticLog::new(dir.path().join("test_log.txt"));

        log.append("x").unwrap();
        let content = log.read_all().unwrap();

        assert!(content.contains("x"));
        assert!(content.ends_with(": x\n"));
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn lines_carry_parseable_timestamp_prefix() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticLog::new(dir.path().join("test_log.txt"));
        log.append("Starting CPU stress test...").unwrap();

        let content = log.read_all().unwrap();
        let (stamp, message) = content.trim_end().split_once(": ").unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok());
        assert_eq!(message, "Starting CPU stress test...");
    }

    #[test]
    fn missing_log_reads_empty() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticLog::new(dir.path().join("never_written.txt"));
        assert_eq!(log.read_all().unwrap(), "");
    }

    #[test]
    fn clear_truncates_to_empty() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticLog::new(dir.path().join("test_log.txt"));
        log.append("first").unwrap();
        log.append("second").unwrap();

        log.clear().unwrap();

        assert_eq!(log.read_all().unwrap(), "");
        assert!(log.take_unflushed().is_empty());
    }

    #[test]
    fn export_is_byte_identical_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticLog::new(dir.path().join("test_log.txt"));
        log.append("alpha").unwrap();
        log.append("beta").unwrap();
        let before = fs::read(log.path()).unwrap();

        let destination = dir.path().join("exported_logs.txt");
        fs::write(&destination, "stale contents that are longer than the log itself").unwrap();
        log.export_to(&destination).unwrap();

        assert_eq!(fs::read(&destination).unwrap(), before);
    }

    #[test]
    fn export_without_log_file_fails() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticLog::new(dir.path().join("missing.txt"));
        assert!(log.export_to(&dir.path().join("out.txt")).is_err());
    }

    #[test]
    fn unflushed_lines_drain_in_append_order() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticLog::new(dir.path().join("test_log.txt"));
        log.append("one").unwrap();
        log.append("two").unwrap();

        let drained = log.take_unflushed();
        assert_eq!(drained.len(), 2);
        assert!(drained[0].ends_with(": one\n"));
        assert!(drained[1].ends_with(": two\n"));
        assert!(log.take_unflushed().is_empty());
    }

    #[test]
    fn concurrent_appends_never_interleave() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(DiagnosticLog::new(dir.path().join("test_log.txt")));
        let payload = "y".repeat(4096);

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let log = Arc::clone(&log);
                let payload = payload.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        log.append(&format!("worker{worker} line{i} {payload}")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = log.read_all().unwrap();
        assert_eq!(content.lines().count(), 200);
        for line in content.lines() {
            let (_, message) = line.split_once(": ").unwrap();
            assert!(message.starts_with("worker"));
            assert!(message.ends_with(&payload));
        }
    }

    #[test]
    fn record_swallows_sink_failures() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened for appending.
        let log = DiagnosticLog::new(dir.path());
        log.record("lost");
        assert!(log.take_unflushed().is_empty());
    }
}
