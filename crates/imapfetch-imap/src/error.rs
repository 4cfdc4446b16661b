//! Error types for the IMAP transport.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned NO response.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server returned BAD response.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// The server closed the connection.
    #[error("Connection lost")]
    ConnectionLost,

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns true if the failure is a network condition worth retrying
    /// on a fresh connection.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ConnectionLost | Self::Timeout(_))
    }

    /// Returns true if the server rejected the credentials.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Maps a failed LOGIN onto an authentication error, keeping network
    /// failures transient.
    pub(crate) fn from_login(err: async_imap::error::Error) -> Self {
        match err {
            async_imap::error::Error::No(msg) | async_imap::error::Error::Bad(msg) => {
                Self::Auth(msg)
            }
            other => other.into(),
        }
    }
}

impl From<async_imap::error::Error> for Error {
    fn from(err: async_imap::error::Error) -> Self {
        match err {
            async_imap::error::Error::Io(e) => Self::Io(e),
            async_imap::error::Error::ConnectionLost => Self::ConnectionLost,
            async_imap::error::Error::No(msg) => Self::No(msg),
            async_imap::error::Error::Bad(msg) => Self::Bad(msg),
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::ConnectionLost.is_transient());
        assert!(Error::Timeout(Duration::from_secs(1)).is_transient());
        assert!(Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset)).is_transient());
        assert!(!Error::Auth("denied".into()).is_transient());
        assert!(!Error::No("no such mailbox".into()).is_transient());
        assert!(!Error::Protocol("garbage".into()).is_transient());
    }

    #[test]
    fn test_login_rejection_is_auth() {
        let err = Error::from_login(async_imap::error::Error::No("[AUTHENTICATIONFAILED]".into()));
        assert!(err.is_auth());

        let err = Error::from_login(async_imap::error::Error::ConnectionLost);
        assert!(err.is_transient());
    }
}
