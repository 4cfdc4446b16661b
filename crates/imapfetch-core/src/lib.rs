//! # imapfetch-core
//!
//! Synchronization and deduplication engine of the `imapfetch` archiver.
//!
//! This crate provides:
//! - Account configuration and validation
//! - Folder selection by exclusion globs, and local folder naming
//! - The archive: a `SQLite` index holding resume marks and message digests
//! - Maildir storage with atomic tmp-to-cur delivery
//! - The per-folder sync state machine and account orchestration
//!
//! The archive is append-only: messages are never modified or removed, and
//! the server mailbox is only ever read.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod archive;
pub mod digest;
mod error;
pub mod folder;
pub mod maildir;
pub mod report;
pub mod sync;
pub mod transport;

pub use account::{Account, Security, ValidationError, ValidationResult, validate_account};
pub use archive::{Archive, ContentIndex, IndexEntry, ResumeMark, ResumeStateStore};
pub use digest::{Digest, header_section};
pub use error::{Error, ErrorKind, Result};
pub use folder::{FolderFilter, decode_local_name, local_name};
pub use maildir::{Maildir, StoredMessage};
pub use report::{AccountReport, FolderReport, RunReport};
pub use sync::{FolderSync, ListedFolder, SyncMode, list_account, sync_account, sync_folder};
pub use transport::{MailTransport, connect};
