//! Maildir writer.
//!
//! Messages are written to a uniquely named file in `tmp`, flushed to
//! disk, and renamed into `cur`. A reader browsing `cur` (or `new`) never
//! sees a partial file because the rename is atomic.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use gethostname::gethostname;

use crate::error::{Error, Result};

static COUNTER: AtomicU64 = AtomicU64::new(0);

#[cfg(unix)]
const INFO_SEPARATOR: char = ':';
#[cfg(not(unix))]
const INFO_SEPARATOR: char = '!';

/// Maildir subdirectories, in creation order.
const SUBDIRS: [&str; 3] = ["tmp", "new", "cur"];

/// A message placed in a maildir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Unique part of the file name.
    pub id: String,
    /// Final location under `cur`.
    pub path: PathBuf,
}

impl StoredMessage {
    /// File name of the stored message.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One folder's maildir directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Maildir {
    path: PathBuf,
}

impl Maildir {
    /// Refers to the maildir at `path`; nothing is created until the first
    /// store.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Root directory of the maildir.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the `tmp`/`new`/`cur` triple if absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if a directory cannot be created.
    pub fn create_dirs(&self) -> Result<()> {
        for sub in SUBDIRS {
            let dir = self.path.join(sub);
            fs::create_dir_all(&dir).map_err(|e| Error::storage(&dir, e))?;
        }
        Ok(())
    }

    /// Durably stores a raw message, blocking the calling thread.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` on any I/O failure; no file is left in
    /// `tmp` in that case.
    pub fn store_blocking(&self, data: &[u8]) -> Result<StoredMessage> {
        self.create_dirs()?;

        let tmp_dir = self.path.join("tmp");
        let (id, tmp_path, mut file) = loop {
            let id = unique_name().map_err(|e| Error::storage(&tmp_dir, e))?;
            let tmp_path = tmp_dir.join(&id);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp_path)
            {
                Ok(file) => break (id, tmp_path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(Error::storage(&tmp_path, e)),
            }
        };

        let mut guard = UnlinkOnError {
            path: Some(tmp_path.clone()),
        };

        file.write_all(data)
            .and_then(|()| file.sync_all())
            .map_err(|e| Error::storage(&tmp_path, e))?;
        drop(file);

        let cur_dir = self.path.join("cur");
        let cur_path = cur_dir.join(format!("{id}{INFO_SEPARATOR}2,"));
        fs::rename(&tmp_path, &cur_path).map_err(|e| Error::storage(&cur_path, e))?;
        guard.path = None;

        sync_dir(&cur_dir).map_err(|e| Error::storage(&cur_dir, e))?;

        tracing::trace!(path = %cur_path.display(), bytes = data.len(), "Message written");
        Ok(StoredMessage { id, path: cur_path })
    }

    /// Durably stores a raw message on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Same as [`Maildir::store_blocking`].
    pub async fn store(&self, data: Vec<u8>) -> Result<StoredMessage> {
        let maildir = self.clone();
        tokio::task::spawn_blocking(move || maildir.store_blocking(&data))
            .await
            .map_err(|e| Error::storage(&self.path, std::io::Error::other(e)))?
    }
}

/// Removes the temporary file unless the rename succeeded.
struct UnlinkOnError {
    path: Option<PathBuf>,
}

impl Drop for UnlinkOnError {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            fs::remove_file(path).ok();
        }
    }
}

/// `<secs>.M<micros>P<pid>Q<counter>.<hostname>`, per the maildir
/// uniqueness convention.
fn unique_name() -> std::io::Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(std::io::Error::other)?;
    let counter = COUNTER.fetch_add(1, Ordering::SeqCst);
    Ok(format!(
        "{}.M{}P{}Q{counter}.{}",
        now.as_secs(),
        now.subsec_micros(),
        process::id(),
        hostname()
    ))
}

fn hostname() -> String {
    let name = gethostname().to_string_lossy().into_owned();
    let name = if name.is_empty() {
        "localhost".to_string()
    } else {
        name
    };
    name.replace('/', "\\057").replace(':', "\\072")
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[test]
    fn test_store_creates_dirs_and_moves_to_cur() {
        let root = tempfile::tempdir().unwrap();
        let maildir = Maildir::new(root.path().join("INBOX"));

        let stored = maildir.store_blocking(b"Subject: x\r\n\r\nbody\r\n").unwrap();

        for sub in SUBDIRS {
            assert!(maildir.path().join(sub).is_dir(), "{sub} missing");
        }
        assert!(entries(&maildir.path().join("tmp")).is_empty());
        assert!(entries(&maildir.path().join("new")).is_empty());
        assert_eq!(entries(&maildir.path().join("cur")), vec![stored.path.clone()]);
        assert_eq!(fs::read(&stored.path).unwrap(), b"Subject: x\r\n\r\nbody\r\n");
        assert!(stored.file_name().ends_with(&format!("{INFO_SEPARATOR}2,")));
        assert!(stored.file_name().starts_with(&stored.id));
    }

    #[test]
    fn test_names_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let maildir = Maildir::new(root.path());

        let names: std::collections::HashSet<_> = (0..50)
            .map(|_| maildir.store_blocking(b"x").unwrap().id)
            .collect();
        assert_eq!(names.len(), 50);
        assert_eq!(entries(&root.path().join("cur")).len(), 50);
    }

    #[test]
    fn test_unique_name_format() {
        let name = unique_name().unwrap();
        let pid = format!("P{}Q", process::id());
        assert!(name.contains(".M"));
        assert!(name.contains(&pid));
        assert!(!name.contains('/'));
        assert!(!name.contains(':'));
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_dir_is_storage_error() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("INBOX");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = Maildir::new(&blocker).store_blocking(b"x").unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
    }

    #[tokio::test]
    async fn test_async_store() {
        let root = tempfile::tempdir().unwrap();
        let maildir = Maildir::new(root.path().join("Sent"));
        let stored = maildir.store(b"Subject: y\r\n\r\n".to_vec()).await.unwrap();
        assert!(stored.path.starts_with(root.path().join("Sent").join("cur")));
    }
}
