//! Error types for SignalWatch.
//!
//! Library crates use [`SignalWatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SignalWatch operations.
#[derive(Debug, thiserror::Error)]
pub enum SignalWatchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a source.
    #[error("network error: {0}")]
    Network(String),

    /// Feed or HTML parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Cache or dataset persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad dataset shape, invalid URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SignalWatchError>;

impl SignalWatchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is scoped to a single source (fetch or parse) and
    /// should not abort the run.
    pub fn is_source_local(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Parse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SignalWatchError::config("missing data/watchlists.json");
        assert_eq!(err.to_string(), "config error: missing data/watchlists.json");

        let err = SignalWatchError::parse("no feed root element");
        assert!(err.to_string().contains("no feed root"));
    }

    #[test]
    fn source_local_errors() {
        assert!(SignalWatchError::Network("timeout".into()).is_source_local());
        assert!(SignalWatchError::parse("bad xml").is_source_local());
        assert!(!SignalWatchError::config("missing").is_source_local());
        let io = SignalWatchError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!io.is_source_local());
    }
}
