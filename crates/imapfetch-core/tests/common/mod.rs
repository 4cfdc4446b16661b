//! Scripted in-memory mail server shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use imapfetch_core::{Account, Error, MailTransport, Result, Security, header_section};
use imapfetch_imap::{Mailbox, MailboxStatus, Uid};

/// A failure injected into one folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// EXAMINE fails because the login is no longer accepted.
    Auth,
    /// Fetching this UID's header loses the connection.
    Header(Uid),
    /// Fetching this UID's body loses the connection.
    Body(Uid),
    /// Fetching this UID's body never completes.
    HangBody(Uid),
}

/// One folder on the scripted server.
#[derive(Debug, Clone)]
pub struct MockFolder {
    pub mailbox: Mailbox,
    pub uid_validity: u32,
    pub messages: BTreeMap<Uid, Vec<u8>>,
    pub search_override: Option<Vec<Uid>>,
}

/// Scripted server that records every call made to it.
#[derive(Debug, Default)]
pub struct MockServer {
    pub folders: Vec<MockFolder>,
    pub faults: Vec<(String, Fault)>,
    pub lists: usize,
    pub selected: Vec<String>,
    pub header_fetches: Vec<(String, Uid)>,
    pub body_fetches: Vec<(String, Uid)>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a folder holding `messages` under consecutive UIDs from 1.
    pub fn with_folder(mut self, name: &str, messages: Vec<Vec<u8>>) -> Self {
        let messages = (1..).zip(messages).collect();
        self.folders.push(MockFolder {
            mailbox: Mailbox::from_raw(name, Some('/')),
            uid_validity: 1,
            messages,
            search_override: None,
        });
        self
    }

    pub fn with_fault(mut self, folder: &str, fault: Fault) -> Self {
        self.faults.push((folder.to_string(), fault));
        self
    }

    pub fn folder_mut(&mut self, name: &str) -> &mut MockFolder {
        self.folders
            .iter_mut()
            .find(|f| f.mailbox.name == name)
            .unwrap()
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    pub fn clear_log(&mut self) {
        self.lists = 0;
        self.selected.clear();
        self.header_fetches.clear();
        self.body_fetches.clear();
    }

    fn has_fault(&self, folder: &str, fault: Fault) -> bool {
        self.faults.iter().any(|(f, x)| f == folder && *x == fault)
    }

    fn folder(&self, mailbox: &Mailbox) -> Result<&MockFolder> {
        self.folders
            .iter()
            .find(|f| f.mailbox.raw == mailbox.raw)
            .ok_or_else(|| Error::Protocol(format!("no such folder {}", mailbox.name)))
    }

    fn message(&self, mailbox: &Mailbox, uid: Uid) -> Result<&Vec<u8>> {
        self.folder(mailbox)?
            .messages
            .get(&uid)
            .ok_or_else(|| Error::Protocol(format!("UID {uid} vanished")))
    }
}

fn connection_lost() -> Error {
    Error::Network(imapfetch_imap::Error::ConnectionLost)
}

impl MailTransport for MockServer {
    async fn list_folders(&mut self) -> Result<Vec<Mailbox>> {
        self.lists += 1;
        Ok(self.folders.iter().map(|f| f.mailbox.clone()).collect())
    }

    async fn select(&mut self, folder: &Mailbox) -> Result<MailboxStatus> {
        self.selected.push(folder.name.clone());
        if self.has_fault(&folder.name, Fault::Auth) {
            return Err(Error::Auth("session no longer authenticated".to_string()));
        }
        let folder = self.folder(folder)?;
        Ok(MailboxStatus {
            uid_validity: Some(folder.uid_validity),
            exists: u32::try_from(folder.messages.len()).unwrap(),
        })
    }

    async fn search_uids_above(&mut self, folder: &Mailbox, min: Uid) -> Result<Vec<Uid>> {
        let folder = self.folder(folder)?;
        if let Some(uids) = &folder.search_override {
            return Ok(uids.clone());
        }
        Ok(folder.messages.range(min + 1..).map(|(&uid, _)| uid).collect())
    }

    async fn fetch_header(&mut self, folder: &Mailbox, uid: Uid) -> Result<Vec<u8>> {
        self.header_fetches.push((folder.name.clone(), uid));
        if self.has_fault(&folder.name, Fault::Header(uid)) {
            return Err(connection_lost());
        }
        Ok(header_section(self.message(folder, uid)?).to_vec())
    }

    async fn fetch_full(&mut self, folder: &Mailbox, uid: Uid) -> Result<Vec<u8>> {
        self.body_fetches.push((folder.name.clone(), uid));
        if self.has_fault(&folder.name, Fault::Body(uid)) {
            return Err(connection_lost());
        }
        if self.has_fault(&folder.name, Fault::HangBody(uid)) {
            std::future::pending::<()>().await;
        }
        Ok(self.message(folder, uid)?.clone())
    }
}

/// A distinct message.
pub fn message(id: u32) -> Vec<u8> {
    message_with_body(id, &format!("body of message {id}"))
}

/// A message whose header identifies it as `id`.
pub fn message_with_body(id: u32, body: &str) -> Vec<u8> {
    format!(
        "Message-ID: <{id}@example.com>\r\nFrom: sender@example.com\r\nSubject: message {id}\r\n\r\n{body}\r\n"
    )
    .into_bytes()
}

pub fn account(name: &str, archive: &Path) -> Account {
    Account {
        name: name.to_string(),
        archive: archive.to_path_buf(),
        server: "imap.example.com".to_string(),
        port: None,
        security: Security::Tls,
        username: "me@example.com".to_string(),
        password: "secret".to_string(),
        exclude: Vec::new(),
        incremental: true,
        quoting: false,
    }
}

fn entries(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            let mut paths: Vec<_> = entries.map(|e| e.unwrap().path()).collect();
            paths.sort();
            paths
        }
        Err(_) => Vec::new(),
    }
}

/// Files delivered into a folder's maildir.
pub fn stored_files(archive: &Path, local: &str) -> Vec<PathBuf> {
    let maildir = archive.join(local);
    let mut files = entries(&maildir.join("cur"));
    files.extend(entries(&maildir.join("new")));
    files
}

/// Files left in a folder's `tmp`.
pub fn tmp_files(archive: &Path, local: &str) -> Vec<PathBuf> {
    entries(&archive.join(local).join("tmp"))
}

/// Every message file in the archive, across all folders.
pub fn all_stored_files(archive: &Path) -> Vec<PathBuf> {
    entries(archive)
        .into_iter()
        .filter(|p| p.is_dir())
        .flat_map(|dir| {
            let local = dir.file_name().unwrap().to_string_lossy().into_owned();
            stored_files(archive, &local)
        })
        .collect()
}

/// Contents of every message file in the archive, sorted.
pub fn all_stored_contents(archive: &Path) -> Vec<Vec<u8>> {
    let mut contents: Vec<_> = all_stored_files(archive)
        .iter()
        .map(|p| std::fs::read(p).unwrap())
        .collect();
    contents.sort();
    contents
}
