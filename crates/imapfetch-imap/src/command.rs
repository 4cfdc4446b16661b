//! IMAP commands read through to their tagged completion.
//!
//! The response streams of `async_imap` end quietly when the server closes
//! the connection, so a LIST or FETCH cut short looks exactly like a short
//! answer. Every command here reads responses one at a time until the
//! completion carrying its own tag; running out of responses before that
//! is [`Error::ConnectionLost`].

use async_imap::imap_proto::{
    AttributeValue, MailboxDatum, MessageSection, NameAttribute, Response, ResponseCode,
    SectionPath, Status,
};

use crate::stream::ImapStream;
use crate::types::{Mailbox, MailboxStatus, Uid};
use crate::{Error, Result};

pub type Inner = async_imap::Session<ImapStream>;

/// Data items of one message collected from FETCH responses.
#[derive(Debug, Default)]
pub struct Parts {
    /// `RFC822.SIZE`.
    pub size: Option<u32>,
    /// `BODY[HEADER]`.
    pub header: Option<Vec<u8>>,
    /// `BODY[TEXT]`, whole or partial.
    pub text: Option<Vec<u8>>,
}

/// Sends `command` and hands every response before its completion to
/// `on_data`.
async fn run<F>(inner: &mut Inner, command: &str, mut on_data: F) -> Result<()>
where
    F: FnMut(&Response<'_>),
{
    let tag = inner.run_command(command).await?;
    loop {
        let response = inner.read_response().await.ok_or(Error::ConnectionLost)??;
        match response.parsed() {
            Response::Done {
                tag: done,
                status,
                information,
                ..
            } if *done == tag => {
                let information = information.as_deref().unwrap_or_default().to_string();
                return match status {
                    Status::Ok => Ok(()),
                    Status::No => Err(Error::No(information)),
                    Status::Bad => Err(Error::Bad(information)),
                    other => Err(Error::Protocol(format!(
                        "unexpected {other:?} completion: {information}"
                    ))),
                };
            }
            other => on_data(other),
        }
    }
}

/// `LIST "" "*"`, without `\Noselect` entries.
pub async fn list(inner: &mut Inner) -> Result<Vec<Mailbox>> {
    let mut mailboxes = Vec::new();
    run(inner, r#"LIST "" "*""#, |response| {
        if let Response::MailboxData(MailboxDatum::List {
            name_attributes,
            delimiter,
            name,
        }) = response
        {
            if name_attributes
                .iter()
                .any(|attr| matches!(attr, NameAttribute::NoSelect))
            {
                return;
            }
            let delimiter = delimiter.as_deref().and_then(|d| d.chars().next());
            mailboxes.push(Mailbox::from_raw(name.to_string(), delimiter));
        }
    })
    .await?;
    Ok(mailboxes)
}

/// `EXAMINE`: opens a mailbox read-only.
pub async fn examine(inner: &mut Inner, mailbox: &str) -> Result<MailboxStatus> {
    let command = format!("EXAMINE {}", quote(mailbox)?);
    let mut status = MailboxStatus::default();
    run(inner, &command, |response| match response {
        Response::MailboxData(MailboxDatum::Exists(exists)) => status.exists = *exists,
        Response::Data {
            code: Some(ResponseCode::UidValidity(validity)),
            ..
        } => status.uid_validity = Some(*validity),
        _ => {}
    })
    .await?;
    Ok(status)
}

/// `UID SEARCH`, in the order the server sent the UIDs.
pub async fn uid_search(inner: &mut Inner, criteria: &str) -> Result<Vec<Uid>> {
    let mut uids = Vec::new();
    run(inner, &format!("UID SEARCH {criteria}"), |response| {
        if let Response::MailboxData(MailboxDatum::Search(found)) = response {
            uids.extend_from_slice(found);
        }
    })
    .await?;
    Ok(uids)
}

/// `UID FETCH` of one message.
///
/// Returns `None` if the command completed without any data for `uid`.
pub async fn uid_fetch(inner: &mut Inner, uid: Uid, items: &str) -> Result<Option<Parts>> {
    let mut parts: Option<Parts> = None;
    run(inner, &format!("UID FETCH {uid} ({items})"), |response| {
        let Response::Fetch(_, attrs) = response else {
            return;
        };
        // Unsolicited FETCH responses for other messages may interleave.
        if !attrs
            .iter()
            .any(|attr| matches!(attr, AttributeValue::Uid(found) if *found == uid))
        {
            return;
        }

        let entry = parts.get_or_insert_with(Parts::default);
        for attr in attrs {
            match attr {
                AttributeValue::Rfc822Size(size) => entry.size = Some(*size),
                AttributeValue::BodySection {
                    section: Some(SectionPath::Full(MessageSection::Header)),
                    data: Some(data),
                    ..
                } => entry.header = Some(data.to_vec()),
                AttributeValue::BodySection {
                    section: Some(SectionPath::Full(MessageSection::Text)),
                    data: Some(data),
                    ..
                } => entry.text = Some(data.to_vec()),
                _ => {}
            }
        }
    })
    .await?;
    Ok(parts)
}

/// Quotes a mailbox name as an IMAP quoted string.
pub fn quote(name: &str) -> Result<String> {
    if name.contains(['\r', '\n']) {
        return Err(Error::Protocol(format!(
            "mailbox name {name:?} contains a line break"
        )));
    }
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    Ok(quoted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_plain() {
        assert_eq!(quote("INBOX").unwrap(), r#""INBOX""#);
        assert_eq!(quote("Archive/2019").unwrap(), r#""Archive/2019""#);
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"say "hi""#).unwrap(), r#""say \"hi\"""#);
        assert_eq!(quote(r"a\b").unwrap(), r#""a\\b""#);
    }

    #[test]
    fn test_quote_rejects_line_breaks() {
        assert!(matches!(quote("INBOX\r\nLOGOUT"), Err(Error::Protocol(_))));
    }
}
