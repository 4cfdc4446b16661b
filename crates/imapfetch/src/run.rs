//! Running the configured accounts.

use std::collections::HashMap;
use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use imapfetch_core::{
    Account, AccountReport, Archive, Error, RunReport, SyncMode, list_account, sync_account,
};
use imapfetch_imap::Session;
use tracing::{error, info};

/// Synchronizes accounts, up to `jobs` at a time.
///
/// Accounts configured with the same archive root share one opened
/// [`Archive`]. Reports come back in configuration order.
pub async fn sync_all(accounts: &[Account], mode: SyncMode, jobs: usize) -> RunReport {
    let archives = open_archives(accounts).await;

    let reports = stream::iter(accounts)
        .map(|account| {
            let archive = archives.get(&account.archive);
            async move {
                match archive {
                    Some(Ok(archive)) => sync_one(account, archive, mode).await,
                    Some(Err(err)) => AccountReport::failed(&account.name, shared_failure(account, err)),
                    None => AccountReport::failed(
                        &account.name,
                        Error::Config(format!(
                            "archive {} was not opened",
                            account.archive.display()
                        )),
                    ),
                }
            }
        })
        .buffered(jobs)
        .collect::<Vec<_>>()
        .await;

    for archive in archives.values().flatten() {
        archive.close().await;
    }
    RunReport { accounts: reports }
}

/// Opens each distinct archive root once.
async fn open_archives(accounts: &[Account]) -> HashMap<PathBuf, Result<Archive, Error>> {
    let mut archives = HashMap::new();
    for account in accounts {
        if archives.contains_key(&account.archive) {
            continue;
        }
        let opened = Archive::open(&account.archive).await;
        if let Err(err) = &opened {
            error!(archive = %account.archive.display(), error = %err, "Cannot open archive");
        }
        archives.insert(account.archive.clone(), opened);
    }
    archives
}

/// The error reported by each account whose archive failed to open.
///
/// An archive in the older format stays a configuration error; anything
/// else is a storage failure of the root.
fn shared_failure(account: &Account, err: &Error) -> Error {
    match err {
        Error::Config(msg) => Error::Config(msg.clone()),
        other => Error::storage(&account.archive, std::io::Error::other(other.to_string())),
    }
}

async fn sync_one(account: &Account, archive: &Archive, mode: SyncMode) -> AccountReport {
    let mut session: Session = match imapfetch_core::connect(account).await {
        Ok(session) => session,
        Err(err) => {
            error!(account = %account.name, error = %err, "Cannot connect");
            return AccountReport::failed(&account.name, err);
        }
    };

    let report = sync_account(&mut session, archive, account, mode).await;
    session.logout().await;
    report
}

/// Prints every account's folders, marking excluded ones.
///
/// Returns whether every account could be listed.
pub async fn list_all(accounts: &[Account]) -> bool {
    let mut success = true;
    for account in accounts {
        let listed = match imapfetch_core::connect(account).await {
            Ok(mut session) => {
                let listed = list_account(&mut session, account).await;
                session.logout().await;
                listed
            }
            Err(err) => Err(err),
        };

        match listed {
            Ok(folders) => {
                info!(account = %account.name, count = folders.len(), "Listed folders");
                println!("[{}]", account.name);
                for folder in folders {
                    match folder.excluded_by {
                        Some(pattern) => {
                            println!("  {}  (excluded by {pattern:?})", folder.mailbox.name);
                        }
                        None => println!("  {}", folder.mailbox.name),
                    }
                }
            }
            Err(err) => {
                error!(account = %account.name, error = %err, "Cannot list folders");
                eprintln!("[{}] [{}] {err}", account.name, err.kind());
                success = false;
            }
        }
    }
    success
}
