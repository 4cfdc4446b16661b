//! Archive root: the index database and the folder maildirs.
//!
//! One SQLite database, `index.db`, lives in the archive root and holds
//! both the resume state and the content index. Accounts configured with
//! the same root share one [`Archive`] and therefore one index, which is
//! what makes deduplication work across accounts as well as folders.

mod index;
mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

pub use index::{ContentIndex, DigestLock, IndexEntry};
pub use state::{ResumeMark, ResumeStateStore};

use crate::error::{Error, Result};
use crate::maildir::Maildir;
use index::DigestLocks;

/// File name of the index database inside the archive root.
pub const INDEX_FILE: &str = "index.db";

/// Index file left behind by the older, incompatible archive format.
const LEGACY_INDEX_FILE: &str = "index";

/// An opened archive.
///
/// Cloning is cheap; clones share the database pool and the per-digest
/// locks.
#[derive(Debug, Clone)]
pub struct Archive {
    root: PathBuf,
    pool: SqlitePool,
    locks: Arc<DigestLocks>,
}

impl Archive {
    /// Opens the archive at `root`, creating the directory and the index
    /// database if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the root holds an archive in the older
    /// format, `Error::Storage` if the root cannot be created and
    /// `Error::Database` if the index cannot be opened or initialized.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let legacy = root.join(LEGACY_INDEX_FILE);
        if tokio::fs::metadata(&legacy)
            .await
            .is_ok_and(|meta| meta.is_file())
        {
            tracing::error!(path = %legacy.display(), "Archive was created by an older version");
            return Err(Error::Config(format!(
                "{}: incompatible archive format (found {LEGACY_INDEX_FILE:?} file)",
                root.display()
            )));
        }
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| Error::storage(&root, e))?;

        let options = SqliteConnectOptions::new()
            .filename(root.join(INDEX_FILE))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let archive = Self::with_pool(root, pool);
        archive.initialize().await?;
        tracing::info!(root = %archive.root.display(), "Opened archive");
        Ok(archive)
    }

    /// Opens an archive whose index lives in memory, for testing.
    ///
    /// Maildirs are still written below `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory(root: impl Into<PathBuf>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let archive = Self::with_pool(root.into(), pool);
        archive.initialize().await?;
        Ok(archive)
    }

    fn with_pool(root: PathBuf, pool: SqlitePool) -> Self {
        Self {
            root,
            pool,
            locks: Arc::default(),
        }
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        // Resume state, one row per folder
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS folders (
                account TEXT NOT NULL,
                folder TEXT NOT NULL,
                lastseen INTEGER NOT NULL,
                uid_validity INTEGER,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (account, folder)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Content index, one row per stored message
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                digest BLOB PRIMARY KEY,
                account TEXT NOT NULL,
                folder TEXT NOT NULL,
                uid INTEGER NOT NULL,
                file TEXT NOT NULL,
                stored_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Root directory of the archive.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maildir for a folder's local directory name.
    #[must_use]
    pub fn maildir(&self, local_name: &str) -> Maildir {
        Maildir::new(self.root.join(local_name))
    }

    /// The content index.
    #[must_use]
    pub const fn index(&self) -> ContentIndex<'_> {
        ContentIndex::new(&self.pool, &self.locks)
    }

    /// The resume state store.
    #[must_use]
    pub const fn state(&self) -> ResumeStateStore<'_> {
        ResumeStateStore::new(&self.pool)
    }

    /// Closes the database, flushing the write-ahead log.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
