//! Read-only IMAP session with bounded retry and automatic reconnection.
//!
//! The archiver only ever reads from the server: mailboxes are opened with
//! EXAMINE and message data is requested with `BODY.PEEK`, so no flag is
//! ever set as a side effect of a fetch.
//!
//! Every request runs under the configured I/O timeout. A transient
//! failure (I/O error, lost connection, timeout) drops the connection,
//! waits with exponential backoff and replays the request on a fresh
//! connection, re-examining the last mailbox first. Anything else is
//! returned to the caller unchanged.

use tracing::{debug, trace, warn};

use crate::command::{self, Inner, Parts};
use crate::config::Config;
use crate::quirks::{ServerQuirks, ServerType};
use crate::stream;
use crate::types::{Mailbox, MailboxStatus, Uid};
use crate::{Error, Result};

const HEADER_ITEMS: &str = "UID BODY.PEEK[HEADER]";

/// A request replayed as a unit when the connection has to be re-established.
#[derive(Debug, Clone, Copy)]
enum Request<'a> {
    List,
    Examine(&'a str),
    Search { mailbox: &'a str, above: Uid },
    Header { mailbox: &'a str, uid: Uid },
    /// Size, header and the start of the text.
    FirstChunk { mailbox: &'a str, uid: Uid, len: u32 },
    /// More text, from `offset` into the text section.
    Chunk {
        mailbox: &'a str,
        uid: Uid,
        offset: usize,
        len: u32,
    },
}

impl Request<'_> {
    const fn mailbox(&self) -> Option<&str> {
        match self {
            Self::List => None,
            Self::Examine(mailbox)
            | Self::Search { mailbox, .. }
            | Self::Header { mailbox, .. }
            | Self::FirstChunk { mailbox, .. }
            | Self::Chunk { mailbox, .. } => Some(mailbox),
        }
    }
}

enum Reply {
    Mailboxes(Vec<Mailbox>),
    Status(MailboxStatus),
    Uids(Vec<Uid>),
    Message(Vec<u8>),
    Parts(Parts),
}

/// High-level read-only IMAP session.
pub struct Session {
    config: Config,
    username: String,
    password: String,
    inner: Option<Inner>,
    examined: Option<String>,
    quirks: ServerQuirks,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("username", &self.username)
            .field("connected", &self.inner.is_some())
            .field("examined", &self.examined)
            .field("quirks", &self.quirks)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connects to the server and logs in.
    ///
    /// The initial connection is retried like any other request; a
    /// rejected login is returned immediately as [`Error::Auth`].
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached after all retries
    /// or the credentials are rejected.
    pub async fn connect(
        config: Config,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let mut session = Self {
            config,
            username: username.into(),
            password: password.into(),
            inner: None,
            examined: None,
            quirks: ServerQuirks::default(),
        };

        let mut attempt = 0;
        loop {
            match session.open().await {
                Ok(inner) => {
                    session.inner = Some(inner);
                    return Ok(session);
                }
                Err(err) if err.is_transient() && attempt < session.config.max_retries => {
                    attempt += 1;
                    let delay = session.config.backoff(attempt);
                    warn!(host = %session.config.host, %err, attempt, ?delay, "connection failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Returns the quirks detected for this server.
    #[must_use]
    pub const fn quirks(&self) -> &ServerQuirks {
        &self.quirks
    }

    /// Lists all selectable mailboxes, in server order.
    ///
    /// # Errors
    ///
    /// Returns an error if the LIST command fails.
    pub async fn list_folders(&mut self) -> Result<Vec<Mailbox>> {
        match self.execute(Request::List).await? {
            Reply::Mailboxes(mailboxes) => Ok(mailboxes),
            other => Err(unexpected(&other)),
        }
    }

    /// Opens a mailbox read-only and returns its status.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox does not exist or EXAMINE fails.
    pub async fn examine(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        match self.execute(Request::Examine(mailbox)).await? {
            Reply::Status(status) => Ok(status),
            other => Err(unexpected(&other)),
        }
    }

    /// Returns the UIDs in `mailbox` strictly greater than `above`, in
    /// ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn uid_search_above(&mut self, mailbox: &str, above: Uid) -> Result<Vec<Uid>> {
        match self.execute(Request::Search { mailbox, above }).await? {
            Reply::Uids(uids) => Ok(uids),
            other => Err(unexpected(&other)),
        }
    }

    /// Fetches the header section of a message without marking it seen.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the server does not return
    /// the requested message.
    pub async fn fetch_header(&mut self, mailbox: &str, uid: Uid) -> Result<Vec<u8>> {
        match self.execute(Request::Header { mailbox, uid }).await? {
            Reply::Message(bytes) => Ok(bytes),
            other => Err(unexpected(&other)),
        }
    }

    /// Fetches the complete raw message without marking it seen.
    ///
    /// The header, the reported size and the first
    /// [`first_chunk`](Config::first_chunk) bytes of text come in one
    /// request; the rest of the text follows in partial fetches of
    /// [`chunk_size`](Config::chunk_size) bytes until the reported size is
    /// reached. Each request has its own timeout and retries.
    ///
    /// With server quirks active, a message without a text section is
    /// returned as its header alone, and a text that ends before the
    /// reported size is returned as received.
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch fails, the server does not return the
    /// requested message, or the message ends before its reported size.
    pub async fn fetch_full(&mut self, mailbox: &str, uid: Uid) -> Result<Vec<u8>> {
        let len = self.config.first_chunk;
        let parts = match self.execute(Request::FirstChunk { mailbox, uid, len }).await? {
            Reply::Parts(parts) => parts,
            other => return Err(unexpected(&other)),
        };
        let lenient = self.quirks.missing_body_tolerated;

        let mut message = parts
            .header
            .ok_or_else(|| Error::Protocol(format!("no header section for UID {uid}")))?;
        let header_len = message.len();
        let Some(text) = parts.text else {
            if lenient {
                debug!(uid, "server returned no body, storing header only");
                return Ok(message);
            }
            return Err(Error::Protocol(format!("no body section for UID {uid}")));
        };
        let size = parts
            .size
            .ok_or_else(|| Error::Protocol(format!("no size reported for UID {uid}")))?;
        let size = usize::try_from(size).unwrap_or(usize::MAX);
        message.extend_from_slice(&text);

        while message.len() < size {
            let offset = message.len() - header_len;
            let len = self.config.chunk_size;
            trace!(uid, offset, len, "next partial fetch");
            let part = match self
                .execute(Request::Chunk {
                    mailbox,
                    uid,
                    offset,
                    len,
                })
                .await?
            {
                Reply::Parts(parts) => parts.text.unwrap_or_default(),
                other => return Err(unexpected(&other)),
            };

            if part.is_empty() {
                if lenient {
                    debug!(
                        uid,
                        received = message.len(),
                        size,
                        "message ended before its reported size"
                    );
                    break;
                }
                return Err(Error::Protocol(format!(
                    "UID {uid} ended after {} of {size} bytes",
                    message.len()
                )));
            }
            message.extend_from_slice(&part);
        }
        Ok(message)
    }

    /// Logs out and closes the connection. Failures are ignored.
    pub async fn logout(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            let logout = tokio::time::timeout(self.config.io_timeout, inner.logout()).await;
            if let Ok(Err(err)) = logout {
                debug!(%err, "logout failed");
            }
        }
        self.examined = None;
    }

    /// Connects, logs in and detects server quirks.
    async fn open(&mut self) -> Result<Inner> {
        debug!(host = %self.config.host, port = self.config.port, "connecting");
        let stream = stream::connect(&self.config).await?;
        let client = async_imap::Client::new(stream);

        debug!(username = %self.username, "logging in");
        let login = tokio::time::timeout(
            self.config.connect_timeout,
            client.login(&self.username, &self.password),
        )
        .await
        .map_err(|_| Error::Timeout(self.config.connect_timeout))?;
        let mut inner = login.map_err(|(err, _client)| Error::from_login(err))?;

        let capabilities = tokio::time::timeout(self.config.io_timeout, inner.capabilities())
            .await
            .map_err(|_| Error::Timeout(self.config.io_timeout))??;
        let server_type = ServerType::detect(&self.config.host, capabilities.has_str("X-GM-EXT-1"));
        if server_type != ServerType::Unknown {
            debug!(?server_type, "enabling server quirks");
        }
        self.quirks = ServerQuirks::for_server(server_type);

        Ok(inner)
    }

    /// Runs a request, reconnecting and replaying it on transient failures.
    async fn execute(&mut self, request: Request<'_>) -> Result<Reply> {
        let mut attempt = 0;
        loop {
            let timeout = self.config.io_timeout;
            let result = tokio::time::timeout(timeout, self.attempt(request))
                .await
                .unwrap_or(Err(Error::Timeout(timeout)));

            match result {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_transient() => {
                    self.inner = None;
                    self.examined = None;
                    if attempt >= self.config.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    let delay = self.config.backoff(attempt);
                    warn!(?request, %err, attempt, ?delay, "transient IMAP failure, reconnecting");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt(&mut self, request: Request<'_>) -> Result<Reply> {
        if self.inner.is_none() {
            let inner = self.open().await?;
            self.inner = Some(inner);
            self.examined = None;
        }
        let Some(inner) = self.inner.as_mut() else {
            return Err(Error::ConnectionLost);
        };

        if let Some(mailbox) = request.mailbox() {
            let stale = self.examined.as_deref() != Some(mailbox);
            if stale || matches!(request, Request::Examine(_)) {
                trace!(mailbox, "EXAMINE");
                self.examined = None;
                let status = command::examine(inner, mailbox).await?;
                self.examined = Some(mailbox.to_owned());
                if matches!(request, Request::Examine(_)) {
                    return Ok(Reply::Status(status));
                }
            }
        }

        match request {
            Request::List => {
                trace!("LIST \"\" *");
                Ok(Reply::Mailboxes(command::list(inner).await?))
            }
            Request::Examine(_) => Err(Error::Protocol("EXAMINE not issued".to_string())),
            Request::Search { above, .. } => {
                let Some(first) = above.checked_add(1) else {
                    return Ok(Reply::Uids(Vec::new()));
                };
                trace!(first, "UID SEARCH");
                let found = command::uid_search(inner, &format!("UID {first}:*")).await?;
                // `n:*` always matches the highest UID, even below `n`.
                let mut uids: Vec<Uid> = found.into_iter().filter(|uid| *uid > above).collect();
                uids.sort_unstable();
                uids.dedup();
                Ok(Reply::Uids(uids))
            }
            Request::Header { uid, .. } => {
                trace!(uid, items = HEADER_ITEMS, "UID FETCH");
                let parts = command::uid_fetch(inner, uid, HEADER_ITEMS)
                    .await?
                    .ok_or_else(|| missing(uid))?;
                let header = parts
                    .header
                    .ok_or_else(|| Error::Protocol(format!("no header section for UID {uid}")))?;
                Ok(Reply::Message(header))
            }
            Request::FirstChunk { uid, len, .. } => {
                let items = format!("UID RFC822.SIZE BODY.PEEK[HEADER] BODY.PEEK[TEXT]<0.{len}>");
                trace!(uid, items = %items, "UID FETCH");
                let parts = command::uid_fetch(inner, uid, &items)
                    .await?
                    .ok_or_else(|| missing(uid))?;
                Ok(Reply::Parts(parts))
            }
            Request::Chunk {
                uid, offset, len, ..
            } => {
                let items = format!("UID BODY.PEEK[TEXT]<{offset}.{len}>");
                trace!(uid, items = %items, "UID FETCH");
                let parts = command::uid_fetch(inner, uid, &items)
                    .await?
                    .ok_or_else(|| missing(uid))?;
                Ok(Reply::Parts(parts))
            }
        }
    }
}

fn missing(uid: Uid) -> Error {
    Error::Protocol(format!("server did not return UID {uid}"))
}

fn unexpected(reply: &Reply) -> Error {
    let kind = match reply {
        Reply::Mailboxes(_) => "mailbox list",
        Reply::Status(_) => "mailbox status",
        Reply::Uids(_) => "UID list",
        Reply::Message(_) => "message data",
        Reply::Parts(_) => "message parts",
    };
    Error::Protocol(format!("unexpected {kind} reply"))
}
