//! Typed errors for dependency analysis.
//!
//! Per-file problems are converted to an [`AnalysisStatus`](crate::types::AnalysisStatus)
//! at the orchestrator boundary and never abort a run. Only project-level failures
//! (unreadable root, bad config, worker pool setup) reach the caller as `Err`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Malformed source. The file gets an empty dependency set.
    #[error("parse failure in {path}: {message}")]
    ParseFailure { path: String, message: String },

    /// No extractor registered, or its parser back-end is not available.
    #[error("no parser available for extension '{ext}'")]
    UnsupportedLanguage { ext: String },

    /// A candidate path that normalizes to somewhere outside the project root.
    #[error("path escapes project root: {path}")]
    PathEscape { path: String },

    /// Unexpected failure while resolving a single specifier.
    #[error("could not resolve '{specifier}': {message}")]
    Resolution { specifier: String, message: String },

    /// A worker task panicked.
    #[error("{phase} task for {path} failed: {message}")]
    TaskFailure { path: String, phase: &'static str, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("could not build worker pool: {message}")]
    WorkerPool { message: String },
}

impl AnalysisError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config { path: path.into(), message: message.into() }
    }

    pub fn resolution(specifier: &str, message: impl Into<String>) -> Self {
        Self::Resolution { specifier: specifier.to_string(), message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = AnalysisError::ParseFailure {
            path: "pkg/mod.py".to_string(),
            message: "syntax error at line 3".to_string(),
        };
        assert_eq!(err.to_string(), "parse failure in pkg/mod.py: syntax error at line 3");

        let err = AnalysisError::TaskFailure {
            path: "a.js".to_string(),
            phase: "transitive",
            message: "boom".to_string(),
        };
        assert!(err.to_string().starts_with("transitive task for a.js"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error as _;
        let err = AnalysisError::io(
            "/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/missing"));
    }
}
