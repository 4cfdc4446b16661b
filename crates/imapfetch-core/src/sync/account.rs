//! Account-level orchestration: list, select, and sync each folder in turn.

use imapfetch_imap::Mailbox;
use tracing::{debug, error, info};

use super::SyncMode;
use super::engine::sync_folder;
use crate::account::Account;
use crate::archive::Archive;
use crate::error::{ErrorKind, Result};
use crate::folder::FolderFilter;
use crate::report::AccountReport;
use crate::transport::MailTransport;

/// A server folder and whether the account excludes it.
#[derive(Debug, Clone)]
pub struct ListedFolder {
    /// The folder as the server lists it.
    pub mailbox: Mailbox,
    /// The first exclusion pattern matching the folder.
    pub excluded_by: Option<String>,
}

/// Synchronizes every selected folder of an account, one after another.
///
/// A failed folder does not stop the others. An authentication failure
/// does, since every later folder would fail the same way.
pub async fn sync_account<T: MailTransport>(
    transport: &mut T,
    archive: &Archive,
    account: &Account,
    mode: SyncMode,
) -> AccountReport {
    let mode = if account.incremental {
        mode
    } else {
        SyncMode::Full
    };

    // Malformed patterns fail the account before the server is asked anything.
    let filter = match FolderFilter::new(&account.exclude) {
        Ok(filter) => filter,
        Err(err) => {
            error!(account = %account.name, error = %err, "Invalid exclude pattern");
            return AccountReport::failed(&account.name, err);
        }
    };
    let folders = match transport.list_folders().await {
        Ok(folders) => filter.select(folders),
        Err(err) => {
            error!(account = %account.name, error = %err, "Failed to list folders");
            return AccountReport::failed(&account.name, err);
        }
    };
    info!(account = %account.name, folders = folders.len(), ?mode, "Synchronizing account");

    let mut report = AccountReport::new(&account.name);
    for folder in &folders {
        let outcome = sync_folder(transport, archive, account, folder, mode).await;
        let fatal = outcome
            .error
            .as_ref()
            .is_some_and(|err| err.kind() == ErrorKind::Auth);
        report.folders.push(outcome);
        if fatal {
            error!(account = %account.name, "Authentication lost, skipping remaining folders");
            break;
        }
    }

    info!(
        account = %account.name,
        stored = report.stored(),
        duplicates = report.duplicates(),
        "Account done"
    );
    report
}

/// Lists an account's folders, marking the excluded ones.
///
/// Touches neither the archive nor any folder.
///
/// # Errors
///
/// Returns `Error::Config` for a malformed exclude pattern and the
/// transport's error if listing fails.
pub async fn list_account<T: MailTransport>(
    transport: &mut T,
    account: &Account,
) -> Result<Vec<ListedFolder>> {
    let filter = FolderFilter::new(&account.exclude)?;
    let folders = transport.list_folders().await?;
    debug!(account = %account.name, count = folders.len(), "Listed folders");

    Ok(folders
        .into_iter()
        .map(|mailbox| ListedFolder {
            excluded_by: filter.excluded_by(&mailbox.name).map(str::to_string),
            mailbox,
        })
        .collect())
}
