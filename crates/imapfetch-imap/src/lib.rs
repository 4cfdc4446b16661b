//! # imapfetch-imap
//!
//! Read-only IMAP transport for the `imapfetch` archiver, built on
//! [`async_imap`] with a rustls TLS stream.
//!
//! ## Features
//!
//! - **Never mutates the mailbox**: folders are opened with EXAMINE and
//!   messages fetched with `BODY.PEEK`, so no `\Seen` flag is set
//! - **Bounded retry**: every command runs under a timeout; transient
//!   failures reconnect and replay the command a limited number of times
//! - **TLS via rustls**: secure connections without an OpenSSL dependency
//! - **Chunked fetching**: large messages arrive in partial fetches, each
//!   with its own timeout
//! - **Server quirks**: tolerates Gmail and Exchange returning messages
//!   without a body section or shorter than their reported size
//!
//! ## Quick Start
//!
//! ```ignore
//! use imapfetch_imap::{Config, Session};
//!
//! #[tokio::main]
//! async fn main() -> imapfetch_imap::Result<()> {
//!     let config = Config::new("imap.example.com");
//!     let mut session = Session::connect(config, "user@example.com", "password").await?;
//!
//!     for mailbox in session.list_folders().await? {
//!         let uids = session.uid_search_above(&mailbox.raw, 0).await?;
//!         println!("{}: {} messages", mailbox.name, uids.len());
//!     }
//!
//!     session.logout().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod command;
mod config;
mod error;
pub mod quirks;
mod session;
pub mod stream;
mod types;

pub use config::{Config, ConfigBuilder, Security};
pub use error::{Error, Result};
pub use quirks::{ServerQuirks, ServerType};
pub use session::Session;
pub use stream::{ImapStream, Transport};
pub use types::{Mailbox, MailboxStatus, Uid};
