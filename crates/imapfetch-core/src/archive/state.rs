//! Resume state store.

use chrono::Utc;
use imapfetch_imap::Uid;
use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use crate::error::Result;
use crate::sync::SyncMode;

/// Persisted resume point of one folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeMark {
    /// Highest UID fully processed.
    pub uid: Uid,
    /// UIDVALIDITY the mark was recorded under.
    pub uid_validity: Option<u32>,
}

/// Highest processed UID per (account, folder).
///
/// Each commit is a single upsert statement, so a crash leaves either the
/// old or the new row.
#[derive(Debug, Clone, Copy)]
pub struct ResumeStateStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ResumeStateStore<'a> {
    pub(super) const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the persisted mark of a folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, account: &str, folder: &str) -> Result<Option<ResumeMark>> {
        let row = sqlx::query(
            r"
            SELECT lastseen, uid_validity
            FROM folders
            WHERE account = ? AND folder = ?
            ",
        )
        .bind(account)
        .bind(folder)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|row| ResumeMark {
            uid: row.get::<u32, _>("lastseen"),
            uid_validity: row.get::<Option<u32>, _>("uid_validity"),
        }))
    }

    /// Get the UID a run should resume after.
    ///
    /// Returns 0 for a folder never synchronized, and always under
    /// [`SyncMode::Full`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn last_seen(&self, account: &str, folder: &str, mode: SyncMode) -> Result<Uid> {
        if mode == SyncMode::Full {
            return Ok(0);
        }
        Ok(self.get(account, folder).await?.map_or(0, |mark| mark.uid))
    }

    /// Record a new resume point for a folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn commit(
        &self,
        account: &str,
        folder: &str,
        uid: Uid,
        uid_validity: Option<u32>,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO folders (account, folder, lastseen, uid_validity, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(account, folder) DO UPDATE SET
                lastseen = excluded.lastseen,
                uid_validity = excluded.uid_validity,
                updated_at = excluded.updated_at
            ",
        )
        .bind(account)
        .bind(folder)
        .bind(uid)
        .bind(uid_validity)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool)
        .await?;

        tracing::debug!(account, folder, uid, "Committed resume mark");
        Ok(())
    }
}
