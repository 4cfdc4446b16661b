//! Account model types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Security/encryption mode for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// No encryption; only for servers on a trusted local network.
    Plain,
}

impl Security {
    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Tls => 993,
            Self::Plain => 143,
        }
    }
}

/// One archived mail account.
///
/// Loaded once per run from its configuration section and never mutated
/// by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Account {
    /// Configuration section name; identifies the account in the index.
    #[serde(skip)]
    pub name: String,
    /// Root directory of the archive.
    pub archive: PathBuf,
    /// IMAP server hostname.
    pub server: String,
    /// IMAP server port; defaults by security mode.
    #[serde(default)]
    pub port: Option<u16>,
    /// Connection security.
    #[serde(default)]
    pub security: Security,
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Glob patterns of folders never to archive.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Resume from the last archived UID; when false every run is a full
    /// resync.
    #[serde(default = "default_incremental")]
    pub incremental: bool,
    /// Percent-encode folder names for the local directory names.
    #[serde(default)]
    pub quoting: bool,
}

const fn default_incremental() -> bool {
    true
}

impl Account {
    /// Port to connect to, falling back to the security mode's default.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.security.default_port())
    }

    /// Transport configuration for this account.
    #[must_use]
    pub fn imap_config(&self) -> imapfetch_imap::Config {
        let security = match self.security {
            Security::Tls => imapfetch_imap::Security::Implicit,
            Security::Plain => imapfetch_imap::Security::None,
        };
        imapfetch_imap::Config::builder(&self.server)
            .security(security)
            .port(self.port())
            .connect_timeout(Duration::from_secs(30))
            .io_timeout(Duration::from_secs(120))
            .build()
    }
}
