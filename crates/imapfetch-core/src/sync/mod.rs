//! The sync engine.

mod account;
mod engine;

pub use account::{ListedFolder, list_account, sync_account};
pub use engine::{FolderSync, sync_folder};

/// How far back a folder sync reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Only UIDs above the folder's resume mark.
    #[default]
    Incremental,
    /// Every UID, ignoring (but not erasing) the resume mark.
    Full,
}

impl SyncMode {
    /// Mode for a run, given the command line's full-resync flag.
    #[must_use]
    pub const fn from_full_flag(full: bool) -> Self {
        if full { Self::Full } else { Self::Incremental }
    }
}
