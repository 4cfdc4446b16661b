//! Outcome of a run, per folder and per account.

use std::fmt;

use imapfetch_imap::Uid;

use crate::error::Error;

/// Outcome of synchronizing one folder.
#[derive(Debug)]
pub struct FolderReport {
    /// Server folder name.
    pub folder: String,
    /// Messages written to the archive.
    pub stored: usize,
    /// Messages skipped because their digest was already indexed.
    pub duplicates: usize,
    /// Resume mark committed by this run, if any.
    pub resume_mark: Option<Uid>,
    /// Why the folder was aborted.
    pub error: Option<Error>,
}

impl FolderReport {
    /// A folder that failed before any message was processed.
    #[must_use]
    pub fn failed(folder: impl Into<String>, error: Error) -> Self {
        Self {
            folder: folder.into(),
            stored: 0,
            duplicates: 0,
            resume_mark: None,
            error: Some(error),
        }
    }

    /// Check whether the folder completed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of synchronizing one account.
#[derive(Debug)]
pub struct AccountReport {
    /// Account (configuration section) name.
    pub account: String,
    /// Folders processed, in processing order.
    pub folders: Vec<FolderReport>,
    /// Account-level failure (login, folder listing).
    pub error: Option<Error>,
}

impl AccountReport {
    /// Create an empty report.
    #[must_use]
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            folders: Vec::new(),
            error: None,
        }
    }

    /// An account that failed before any folder was processed.
    #[must_use]
    pub fn failed(account: impl Into<String>, error: Error) -> Self {
        Self {
            error: Some(error),
            ..Self::new(account)
        }
    }

    /// Total messages stored.
    #[must_use]
    pub fn stored(&self) -> usize {
        self.folders.iter().map(|f| f.stored).sum()
    }

    /// Total duplicates skipped.
    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.folders.iter().map(|f| f.duplicates).sum()
    }

    /// Folders that ended in an error.
    pub fn failed_folders(&self) -> impl Iterator<Item = &FolderReport> {
        self.folders.iter().filter(|f| !f.is_success())
    }

    /// Check whether the account and all its folders completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.folders.iter().all(FolderReport::is_success)
    }
}

impl fmt::Display for AccountReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} stored, {} duplicates, {} folders",
            self.account,
            self.stored(),
            self.duplicates(),
            self.folders.len()
        )?;
        if let Some(err) = &self.error {
            write!(f, "\n  [{}] {err}", err.kind())?;
        }
        for folder in self.failed_folders() {
            if let Some(err) = &folder.error {
                write!(f, "\n  {}: [{}] {err}", folder.folder, err.kind())?;
            }
        }
        Ok(())
    }
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// One report per account, in configuration order.
    pub accounts: Vec<AccountReport>,
}

impl RunReport {
    /// Check whether every account and folder completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.accounts.iter().all(AccountReport::is_success)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for account in &self.accounts {
            writeln!(f, "{account}")?;
        }
        if self.is_success() {
            f.write_str("completed without errors")
        } else {
            f.write_str("encountered errors")
        }
    }
}
