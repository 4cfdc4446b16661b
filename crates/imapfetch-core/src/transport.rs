//! The mail transport seen by the sync engine.
//!
//! The engine only needs a handful of read-only operations. They are
//! abstracted behind [`MailTransport`] so the engine can be driven by the
//! IMAP session in production and by a scripted transport in tests.

use imapfetch_imap::{Mailbox, MailboxStatus, Session, Uid};
use tracing::info;

use crate::account::Account;
use crate::error::Result;

/// Read-only access to one authenticated mail account.
///
/// Implementations retry transient failures themselves, with bounded
/// attempts and timeouts; an error returned here is final for the call.
#[allow(async_fn_in_trait)]
pub trait MailTransport {
    /// Lists all selectable folders, in server order.
    async fn list_folders(&mut self) -> Result<Vec<Mailbox>>;

    /// Opens a folder read-only and reports its status.
    async fn select(&mut self, folder: &Mailbox) -> Result<MailboxStatus>;

    /// UIDs in `folder` strictly greater than `min`, ascending.
    async fn search_uids_above(&mut self, folder: &Mailbox, min: Uid) -> Result<Vec<Uid>>;

    /// Header section of one message, without marking it seen.
    async fn fetch_header(&mut self, folder: &Mailbox, uid: Uid) -> Result<Vec<u8>>;

    /// Complete raw message, without marking it seen.
    async fn fetch_full(&mut self, folder: &Mailbox, uid: Uid) -> Result<Vec<u8>>;
}

impl MailTransport for Session {
    async fn list_folders(&mut self) -> Result<Vec<Mailbox>> {
        Ok(Self::list_folders(self).await?)
    }

    async fn select(&mut self, folder: &Mailbox) -> Result<MailboxStatus> {
        Ok(self.examine(&folder.raw).await?)
    }

    async fn search_uids_above(&mut self, folder: &Mailbox, min: Uid) -> Result<Vec<Uid>> {
        Ok(self.uid_search_above(&folder.raw, min).await?)
    }

    async fn fetch_header(&mut self, folder: &Mailbox, uid: Uid) -> Result<Vec<u8>> {
        Ok(Self::fetch_header(self, &folder.raw, uid).await?)
    }

    async fn fetch_full(&mut self, folder: &Mailbox, uid: Uid) -> Result<Vec<u8>> {
        Ok(Self::fetch_full(self, &folder.raw, uid).await?)
    }
}

/// Connects and logs in to an account's server.
///
/// # Errors
///
/// Returns `Error::Auth` if the credentials are rejected and
/// `Error::Network` if the server cannot be reached.
pub async fn connect(account: &Account) -> Result<Session> {
    let config = account.imap_config();
    info!(
        account = %account.name,
        host = %config.host,
        port = config.port,
        "Connecting"
    );
    let session = Session::connect(config, &account.username, &account.password).await?;
    Ok(session)
}
