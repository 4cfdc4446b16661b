//! Per-folder synchronization state machine.
//!
//! ```text
//! Start -> ListUids -> { FetchHeader -> CheckDedup -> [FetchBody -> Store] -> Advance }*
//!       -> CommitState
//! ```
//!
//! Any step may fail, which aborts the folder. UIDs are processed in
//! ascending order, so the highest completed UID is always a safe resume
//! point: on failure the engine commits at most that prefix, never more.
//! A message is indexed only after its file is on disk, so a crash between
//! the two leaves an orphan file and the message is fetched again on the
//! next run.

use imapfetch_imap::{Mailbox, Uid};
use tracing::{debug, error, info, trace, warn};

use super::SyncMode;
use crate::account::Account;
use crate::archive::{Archive, DigestLock, IndexEntry, ResumeMark};
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::folder::local_name;
use crate::maildir::Maildir;
use crate::report::FolderReport;
use crate::transport::MailTransport;

enum State {
    /// Open the folder and read the previous resume mark.
    Start,
    /// Ask for the UIDs above the effective mark.
    ListUids { mark: Uid },
    /// Fetch the header of the next UID in the batch.
    FetchHeader,
    /// Look the header digest up in the content index.
    CheckDedup { uid: Uid, header: Vec<u8> },
    /// Fetch the whole message for an unknown digest.
    FetchBody {
        uid: Uid,
        digest: Digest,
        lock: DigestLock,
    },
    /// Write the message, then index it.
    Store {
        uid: Uid,
        digest: Digest,
        lock: DigestLock,
        message: Vec<u8>,
    },
    /// Record a UID as fully processed.
    Advance { uid: Uid },
    /// Persist the new resume mark. The last state.
    CommitState,
}

impl State {
    const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ListUids { .. } => "list_uids",
            Self::FetchHeader => "fetch_header",
            Self::CheckDedup { .. } => "check_dedup",
            Self::FetchBody { .. } => "fetch_body",
            Self::Store { .. } => "store",
            Self::Advance { .. } => "advance",
            Self::CommitState => "commit_state",
        }
    }
}

/// Synchronization of one folder of one account.
pub struct FolderSync<'a, T> {
    transport: &'a mut T,
    archive: &'a Archive,
    account: &'a str,
    folder: &'a Mailbox,
    maildir: Maildir,
    mode: SyncMode,

    previous: Option<ResumeMark>,
    uid_validity: Option<u32>,
    validity_changed: bool,
    batch: Vec<Uid>,
    next: usize,
    completed: Option<Uid>,
    committed: Option<Uid>,
    stored: usize,
    duplicates: usize,
}

impl<'a, T: MailTransport> FolderSync<'a, T> {
    /// Prepares a folder sync writing into `maildir`.
    pub fn new(
        transport: &'a mut T,
        archive: &'a Archive,
        account: &'a str,
        folder: &'a Mailbox,
        maildir: Maildir,
        mode: SyncMode,
    ) -> Self {
        Self {
            transport,
            archive,
            account,
            folder,
            maildir,
            mode,
            previous: None,
            uid_validity: None,
            validity_changed: false,
            batch: Vec::new(),
            next: 0,
            completed: None,
            committed: None,
            stored: 0,
            duplicates: 0,
        }
    }

    /// Runs the state machine to completion or to the first error.
    pub async fn run(mut self) -> FolderReport {
        let mut state = State::Start;
        loop {
            trace!(
                account = self.account,
                folder = %self.folder.name,
                state = state.name(),
                "Step"
            );
            state = match self.step(state).await {
                Ok(Some(next)) => next,
                Ok(None) => return self.report(None),
                Err(err) => {
                    self.abort(&err).await;
                    return self.report(Some(err));
                }
            };
        }
    }

    /// Performs one transition; `None` once the folder is finished.
    async fn step(&mut self, state: State) -> Result<Option<State>> {
        let next = match state {
            State::Start => self.start().await?,
            State::ListUids { mark } => self.list_uids(mark).await?,
            State::FetchHeader => match self.batch.get(self.next) {
                Some(&uid) => {
                    let header = self.transport.fetch_header(self.folder, uid).await?;
                    State::CheckDedup { uid, header }
                }
                None => State::CommitState,
            },
            State::CheckDedup { uid, header } => self.check_dedup(uid, &header).await?,
            State::FetchBody { uid, digest, lock } => {
                let message = self.transport.fetch_full(self.folder, uid).await?;
                State::Store {
                    uid,
                    digest,
                    lock,
                    message,
                }
            }
            State::Store {
                uid,
                digest,
                lock,
                message,
            } => self.store(uid, digest, lock, message).await?,
            State::Advance { uid } => {
                self.completed = Some(uid);
                self.next += 1;
                State::FetchHeader
            }
            State::CommitState => {
                let target = self.commit_target();
                self.commit(target).await?;
                info!(
                    account = self.account,
                    folder = %self.folder.name,
                    stored = self.stored,
                    duplicates = self.duplicates,
                    mark = target,
                    "Folder done"
                );
                return Ok(None);
            }
        };
        Ok(Some(next))
    }

    async fn start(&mut self) -> Result<State> {
        let archive = self.archive;
        let state = archive.state();
        self.previous = state.get(self.account, &self.folder.name).await?;

        let status = self.transport.select(self.folder).await?;
        self.uid_validity = status.uid_validity;
        self.validity_changed = matches!(
            (self.previous, status.uid_validity),
            (Some(ResumeMark { uid_validity: Some(old), .. }), Some(new)) if old != new
        );

        let mark = if self.validity_changed {
            warn!(
                account = self.account,
                folder = %self.folder.name,
                "UIDVALIDITY changed, resynchronizing whole folder"
            );
            0
        } else {
            state
                .last_seen(self.account, &self.folder.name, self.mode)
                .await?
        };

        debug!(
            account = self.account,
            folder = %self.folder.name,
            mark,
            exists = status.exists,
            mode = ?self.mode,
            "Resume mark"
        );
        Ok(State::ListUids { mark })
    }

    async fn list_uids(&mut self, mark: Uid) -> Result<State> {
        let uids = self.transport.search_uids_above(self.folder, mark).await?;

        let mut floor = mark;
        for &uid in &uids {
            if uid <= floor {
                return Err(Error::Protocol(format!(
                    "folder {}: UID {uid} is not above {floor}",
                    self.folder.name
                )));
            }
            floor = uid;
        }

        debug!(
            account = self.account,
            folder = %self.folder.name,
            count = uids.len(),
            "Listed new UIDs"
        );
        self.batch = uids;
        Ok(State::FetchHeader)
    }

    async fn check_dedup(&mut self, uid: Uid, header: &[u8]) -> Result<State> {
        let digest = Digest::of_message(header);
        let archive = self.archive;
        let index = archive.index();

        let lock = index.lock(digest).await;
        if index.contains(&digest).await? {
            self.duplicates += 1;
            debug!(
                account = self.account,
                folder = %self.folder.name,
                uid,
                %digest,
                "Duplicate skipped"
            );
            return Ok(State::Advance { uid });
        }
        Ok(State::FetchBody { uid, digest, lock })
    }

    async fn store(
        &mut self,
        uid: Uid,
        digest: Digest,
        lock: DigestLock,
        message: Vec<u8>,
    ) -> Result<State> {
        if message.is_empty() {
            return Err(Error::Protocol(format!(
                "folder {}: UID {uid} returned an empty message",
                self.folder.name
            )));
        }

        let stored = self.maildir.store(message).await?;
        let entry = IndexEntry {
            account: self.account.to_string(),
            folder: self.folder.name.clone(),
            uid,
            file: stored.file_name(),
        };
        self.archive.index().insert(&digest, &entry).await?;
        drop(lock);

        self.stored += 1;
        info!(
            account = self.account,
            folder = %self.folder.name,
            uid,
            %digest,
            file = %entry.file,
            "Stored message"
        );
        Ok(State::Advance { uid })
    }

    /// Mark the folder resumes from when nothing was recorded this run.
    fn previous_mark(&self) -> Uid {
        if self.validity_changed {
            0
        } else {
            self.previous.map_or(0, |mark| mark.uid)
        }
    }

    /// The batch maximum; a full resync never lowers a valid mark.
    fn commit_target(&self) -> Uid {
        let previous = self.previous_mark();
        self.batch.last().map_or(previous, |&max| max.max(previous))
    }

    async fn commit(&mut self, uid: Uid) -> Result<()> {
        self.archive
            .state()
            .commit(self.account, &self.folder.name, uid, self.uid_validity)
            .await?;
        self.committed = Some(uid);
        Ok(())
    }

    /// Keeps the completed prefix, if it moves the mark forward.
    async fn abort(&mut self, err: &Error) {
        error!(
            account = self.account,
            folder = %self.folder.name,
            kind = %err.kind(),
            error = %err,
            "Folder aborted"
        );

        let Some(done) = self.completed else {
            return;
        };
        if !self.validity_changed && done <= self.previous_mark() {
            return;
        }
        match self.commit(done).await {
            Ok(()) => debug!(
                account = self.account,
                folder = %self.folder.name,
                mark = done,
                "Committed completed prefix"
            ),
            Err(commit_err) => error!(
                account = self.account,
                folder = %self.folder.name,
                error = %commit_err,
                "Failed to commit completed prefix"
            ),
        }
    }

    fn report(self, error: Option<Error>) -> FolderReport {
        FolderReport {
            folder: self.folder.name.clone(),
            stored: self.stored,
            duplicates: self.duplicates,
            resume_mark: self.committed,
            error,
        }
    }
}

/// Synchronizes one folder of an account into the archive.
///
/// Never fails: the outcome, error included, is in the report.
pub async fn sync_folder<T: MailTransport>(
    transport: &mut T,
    archive: &Archive,
    account: &Account,
    folder: &Mailbox,
    mode: SyncMode,
) -> FolderReport {
    let local = match local_name(&folder.name, folder.delimiter, account.quoting) {
        Ok(local) => local,
        Err(err) => {
            error!(account = %account.name, folder = %folder.name, error = %err, "Folder skipped");
            return FolderReport::failed(&folder.name, err);
        }
    };

    info!(account = %account.name, folder = %folder.name, local = %local, "Processing folder");
    FolderSync::new(
        transport,
        archive,
        &account.name,
        folder,
        archive.maildir(&local),
        mode,
    )
    .run()
    .await
}
