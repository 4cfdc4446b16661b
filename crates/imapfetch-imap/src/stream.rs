//! Opening the byte stream a session runs over.
//!
//! The session does not care whether it talks plaintext or TLS, only that
//! the stream is readable, writable and can be moved across tasks, so both
//! are handed out as a boxed [`Transport`].

use std::fmt;
use std::sync::{Arc, LazyLock};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::config::{Config, Security};
use crate::{Error, Result};

/// Anything a session can run over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

/// Connected stream, plaintext or TLS.
pub type ImapStream = Box<dyn Transport>;

/// Shared client configuration trusting the Mozilla root store.
static TLS: LazyLock<TlsConnector> = LazyLock::new(|| {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
});

/// Connects with TLS from the first byte.
///
/// # Errors
///
/// Returns `Error::InvalidDnsName` for a host that cannot be a TLS server
/// name, and an I/O or TLS error if the connection or handshake fails.
pub async fn connect_tls(host: &str, port: u16) -> Result<ImapStream> {
    // Checked first so a bad host never costs a connection.
    let server_name = ServerName::try_from(host.to_owned())?;
    let tcp = TcpStream::connect((host, port)).await?;
    let tls = TLS.connect(server_name, tcp).await?;
    debug!(host, port, "TLS established");
    Ok(Box::new(tls))
}

/// Connects without encryption.
///
/// # Errors
///
/// Returns an I/O error if the connection fails.
pub async fn connect_plain(host: &str, port: u16) -> Result<ImapStream> {
    let tcp = TcpStream::connect((host, port)).await?;
    debug!(host, port, "plaintext connection established");
    Ok(Box::new(tcp))
}

/// Opens a stream according to the configured security mode, bounded by
/// the connect timeout.
///
/// # Errors
///
/// Returns `Error::Timeout` if the connect timeout elapses, otherwise the
/// error of the underlying connect.
pub async fn connect(config: &Config) -> Result<ImapStream> {
    let connecting = async {
        match config.security {
            Security::Implicit => connect_tls(&config.host, config.port).await,
            Security::None => connect_plain(&config.host, config.port).await,
        }
    };

    tokio::time::timeout(config.connect_timeout, connecting)
        .await
        .map_err(|_| Error::Timeout(config.connect_timeout))?
}
