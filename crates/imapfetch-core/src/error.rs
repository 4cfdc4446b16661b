//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration; raised before any network activity.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server rejected the account's credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transient network failure that outlasted the transport's retries.
    #[error("Network error: {0}")]
    Network(#[source] imapfetch_imap::Error),

    /// The server answered with something the engine cannot accept.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Writing to the archive failed.
    #[error("Storage error at {}: {source}", .path.display())]
    Storage {
        /// File or directory being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Index database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Error {
    /// Wraps an I/O error with the path it occurred on.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Category of the error, as reported to the operator.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Network(_) => ErrorKind::Network,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Storage { .. } | Self::Database(_) => ErrorKind::Storage,
        }
    }
}

impl From<imapfetch_imap::Error> for Error {
    fn from(err: imapfetch_imap::Error) -> Self {
        match err {
            imapfetch_imap::Error::Auth(msg) => Self::Auth(msg),
            err if err.is_transient() => Self::Network(err),
            err => Self::Protocol(err.to_string()),
        }
    }
}

/// Error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Fatal, aborts the run before any network activity.
    Config,
    /// Fatal for the account.
    Auth,
    /// Aborts the current folder.
    Network,
    /// Aborts the current message and folder.
    Storage,
    /// Aborts the current folder.
    Protocol,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Protocol => "protocol",
        };
        f.write_str(name)
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
