//! Error types for SheetSync.
//!
//! Library crates use [`SheetSyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SheetSync operations.
#[derive(Debug, thiserror::Error)]
pub enum SheetSyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure (DNS, connect, TLS, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with something other than 200 OK.
    #[error("{url}: HTTP {status}")]
    Http { url: String, status: u16 },

    /// A 200 response whose body is an HTML page rather than the asset.
    #[error("{url}: unexpected content type {content_type}")]
    UnexpectedContent { url: String, content_type: String },

    /// CSV parsing or structural error in the tabular source.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Record store could not be read or written.
    #[error("store error: {0}")]
    Store(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Row data that cannot be used, such as a share link without a file id.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SheetSyncError>;

impl SheetSyncError {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SheetSyncError::config("unknown key");
        assert_eq!(err.to_string(), "config error: unknown key");

        let err = SheetSyncError::Http {
            url: "https://example.com/a.mp3".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "https://example.com/a.mp3: HTTP 404");

        let err = SheetSyncError::UnexpectedContent {
            url: "https://example.com/a.jpg".into(),
            content_type: "text/html".into(),
        };
        assert!(err.to_string().contains("text/html"));
    }
}
