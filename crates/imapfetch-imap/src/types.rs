//! Mailbox types returned by the session.

/// Message unique identifier within a mailbox.
pub type Uid = u32;

/// A selectable mailbox on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Human readable name, decoded from modified UTF-7.
    pub name: String,
    /// Name exactly as the server sent it; used on the wire.
    pub raw: String,
    /// Hierarchy delimiter, if the server has a hierarchy.
    pub delimiter: Option<char>,
}

impl Mailbox {
    /// Builds a mailbox from its wire name, decoding modified UTF-7.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>, delimiter: Option<char>) -> Self {
        let raw = raw.into();
        let name = if raw.contains('&') {
            utf7_imap::decode_utf7_imap(raw.clone())
        } else {
            raw.clone()
        };
        Self {
            name,
            raw,
            delimiter,
        }
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Status reported by EXAMINE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// UIDVALIDITY of the mailbox, if reported.
    pub uid_validity: Option<u32>,
    /// Number of messages in the mailbox.
    pub exists: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name_unchanged() {
        let mailbox = Mailbox::from_raw("INBOX/Receipts", Some('/'));
        assert_eq!(mailbox.name, "INBOX/Receipts");
        assert_eq!(mailbox.raw, "INBOX/Receipts");
    }

    #[test]
    fn test_utf7_name_decoded() {
        let mailbox = Mailbox::from_raw("Entw&APw-rfe", Some('.'));
        assert_eq!(mailbox.name, "Entwürfe");
        assert_eq!(mailbox.raw, "Entw&APw-rfe");
        assert_eq!(mailbox.to_string(), "Entwürfe");
    }
}
