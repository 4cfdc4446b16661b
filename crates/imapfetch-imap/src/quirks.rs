//! Server quirks and workarounds.
//!
//! Gmail and Exchange/Outlook both report message sizes that do not match
//! what they send, and occasionally answer a body fetch for an empty
//! message with no body section at all. When one of them is detected the
//! session stores the header alone for a missing body, and stops a chunked
//! fetch at the first empty chunk instead of failing.

/// Known IMAP server types with specific quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerType {
    /// Unknown or generic IMAP server.
    #[default]
    Unknown,
    /// Gmail IMAP (imap.gmail.com).
    Gmail,
    /// Microsoft Exchange, Outlook or Office 365.
    Outlook,
}

impl ServerType {
    /// Detects the server type from the Gmail extension capability and the
    /// configured host name.
    #[must_use]
    pub fn detect(host: &str, gmail_extension: bool) -> Self {
        if gmail_extension {
            return Self::Gmail;
        }

        let lower = host.to_lowercase();
        if lower.contains("gmail") || lower.contains("googlemail") {
            Self::Gmail
        } else if lower.contains("outlook") || lower.contains("office365") || lower.contains("exchange") {
            Self::Outlook
        } else {
            Self::Unknown
        }
    }
}

/// Server-specific quirks and workarounds.
#[derive(Debug, Clone, Default)]
pub struct ServerQuirks {
    /// The detected server type.
    pub server_type: ServerType,

    /// A full fetch may come back without a body section, or end before
    /// the reported size; keep what arrived instead of failing.
    pub missing_body_tolerated: bool,
}

impl ServerQuirks {
    /// Creates quirks configuration for the detected server type.
    #[must_use]
    pub const fn for_server(server_type: ServerType) -> Self {
        match server_type {
            ServerType::Gmail | ServerType::Outlook => Self {
                server_type,
                missing_body_tolerated: true,
            },
            ServerType::Unknown => Self {
                server_type,
                missing_body_tolerated: false,
            },
        }
    }
}
