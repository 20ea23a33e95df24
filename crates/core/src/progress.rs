//! Run log and progress delivery.
//!
//! Every message is appended to an ordered, timestamped [`RunLog`], mirrored to
//! `tracing`, and handed to the caller's [`ProgressReporter`].

use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Receives each progress line. May return the timestamp it displayed the line with.
///
/// Called with the owning [`RunLog`] locked, so it must not log back into it.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, message: &str) -> Option<String>;
}

impl<F> ProgressReporter for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn report(&self, message: &str) -> Option<String> {
        self(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Stats,
    Success,
}

impl LogLevel {
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Stats => "STATS",
            LogLevel::Success => "SUCCESS",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.timestamp, self.level.label(), self.message)
    }
}

/// Local wall-clock timestamp in the run log format.
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Ordered, thread-safe log for one run.
pub struct RunLog {
    entries: Mutex<Vec<LogEntry>>,
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl RunLog {
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self { entries: Mutex::new(Vec::new()), reporter: Some(reporter) }
    }

    /// A log nobody is listening to, apart from `tracing`.
    pub fn detached() -> Self {
        Self { entries: Mutex::new(Vec::new()), reporter: None }
    }

    /// Append a message and return the timestamp it was recorded with.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) -> String {
        let message = message.into();
        match level {
            LogLevel::Warn => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
            LogLevel::Info | LogLevel::Stats | LogLevel::Success => info!("{message}"),
        }

        let line = format!("{}: {message}", level.label());
        // Held across the report so the reporter sees lines in entry order
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let timestamp = self
            .reporter
            .as_ref()
            .and_then(|r| r.report(&line))
            .unwrap_or_else(timestamp_now);
        entries.push(LogEntry { timestamp: timestamp.clone(), level, message });
        timestamp
    }

    pub fn info(&self, message: impl Into<String>) -> String {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: impl Into<String>) -> String {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: impl Into<String>) -> String {
        self.log(LogLevel::Error, message)
    }

    pub fn stats(&self, message: impl Into<String>) -> String {
        self.log(LogLevel::Stats, message)
    }

    pub fn success(&self, message: impl Into<String>) -> String {
        self.log(LogLevel::Success, message)
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::detached()
    }
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog").field("entries", &self.len()).finish()
    }
}
