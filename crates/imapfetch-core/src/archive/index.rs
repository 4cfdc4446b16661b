//! Content index.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use imapfetch_imap::Uid;
use sqlx::Row;
use sqlx::sqlite::SqlitePool;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::digest::Digest;
use crate::error::Result;

/// Where a digest was first stored from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Account name.
    pub account: String,
    /// Server folder name.
    pub folder: String,
    /// UID in that folder.
    pub uid: Uid,
    /// Stored file name in the folder's maildir.
    pub file: String,
}

/// Set of digests of messages already written to the archive.
///
/// A digest is present only once its message is durably on disk.
#[derive(Debug, Clone, Copy)]
pub struct ContentIndex<'a> {
    pool: &'a SqlitePool,
    locks: &'a Arc<DigestLocks>,
}

impl<'a> ContentIndex<'a> {
    pub(super) const fn new(pool: &'a SqlitePool, locks: &'a Arc<DigestLocks>) -> Self {
        Self { pool, locks }
    }

    /// Check whether a message with this digest has been stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn contains(&self, digest: &Digest) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM messages WHERE digest = ?")
            .bind(digest.as_bytes().as_slice())
            .fetch_optional(self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Record a stored message.
    ///
    /// Inserting a digest that is already present keeps the first entry
    /// and returns `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn insert(&self, digest: &Digest, entry: &IndexEntry) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO messages (digest, account, folder, uid, file, stored_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(digest.as_bytes().as_slice())
        .bind(&entry.account)
        .bind(&entry.folder)
        .bind(entry.uid)
        .bind(&entry.file)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get the provenance of a stored digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn origin(&self, digest: &Digest) -> Result<Option<IndexEntry>> {
        let row = sqlx::query(
            r"
            SELECT account, folder, uid, file
            FROM messages
            WHERE digest = ?
            ",
        )
        .bind(digest.as_bytes().as_slice())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|row| IndexEntry {
            account: row.get("account"),
            folder: row.get("folder"),
            uid: row.get::<u32, _>("uid"),
            file: row.get("file"),
        }))
    }

    /// Number of stored messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn len(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM messages")
            .fetch_one(self.pool)
            .await?;
        Ok(u64::try_from(row.get::<i64, _>("count")).unwrap_or_default())
    }

    /// Check whether the index is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Serialize check-then-insert for one digest.
    ///
    /// Holders of the same digest's lock run one at a time; different
    /// digests never contend.
    pub async fn lock(&self, digest: Digest) -> DigestLock {
        let mutex = {
            let mut map = self.locks.map.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(digest).or_default())
        };
        let guard = mutex.lock_owned().await;
        DigestLock {
            digest,
            locks: Arc::clone(self.locks),
            guard: Some(guard),
        }
    }
}

/// Per-digest mutexes, dropped when no longer held or awaited.
#[derive(Debug, Default)]
pub struct DigestLocks {
    map: Mutex<HashMap<Digest, Arc<AsyncMutex<()>>>>,
}

/// Exclusive hold on one digest, released on drop.
#[derive(Debug)]
pub struct DigestLock {
    digest: Digest,
    locks: Arc<DigestLocks>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DigestLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.map.lock().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(&self.digest)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            map.remove(&self.digest);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::archive::Archive;

    fn entry(folder: &str, uid: Uid) -> IndexEntry {
        IndexEntry {
            account: "personal".to_string(),
            folder: folder.to_string(),
            uid,
            file: format!("{uid}.M0P1Q{uid}.host:2,"),
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let archive = Archive::in_memory("/unused").await.unwrap();
        let index = archive.index();
        let digest = Digest::of_header(b"Message-ID: <1@example.com>\r\n\r\n");

        assert!(!index.contains(&digest).await.unwrap());
        assert!(index.is_empty().await.unwrap());

        assert!(index.insert(&digest, &entry("INBOX", 1)).await.unwrap());
        assert!(!index.insert(&digest, &entry("Archive", 9)).await.unwrap());

        assert!(index.contains(&digest).await.unwrap());
        assert_eq!(index.len().await.unwrap(), 1);
        // First writer wins.
        assert_eq!(
            index.origin(&digest).await.unwrap(),
            Some(entry("INBOX", 1))
        );
    }

    #[tokio::test]
    async fn test_lock_serializes_same_digest() {
        let archive = Archive::in_memory("/unused").await.unwrap();
        let index = archive.index();
        let digest = Digest::of_header(b"Subject: a\r\n\r\n");
        let other = Digest::of_header(b"Subject: b\r\n\r\n");

        let held = index.lock(digest).await;

        // A different digest is not blocked.
        let free = tokio::time::timeout(Duration::from_millis(50), index.lock(other)).await;
        assert!(free.is_ok());
        drop(free);

        // The same digest waits until the holder releases it.
        let blocked = tokio::time::timeout(Duration::from_millis(50), index.lock(digest)).await;
        assert!(blocked.is_err());

        drop(held);
        let acquired = tokio::time::timeout(Duration::from_millis(50), index.lock(digest)).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_released_locks_are_forgotten() {
        let archive = Archive::in_memory("/unused").await.unwrap();
        let index = archive.index();

        for n in 0..10u8 {
            let lock = index.lock(Digest::of_header(&[n])).await;
            drop(lock);
        }
        assert!(archive.locks.map.lock().unwrap().is_empty());
    }
}
