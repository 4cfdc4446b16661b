//! Message identity digests.
//!
//! A message is identified by the SHA-224 digest of its header section,
//! normalized to CRLF line endings. Two deliveries of the same message
//! carry byte-identical headers, so the digest is stable across folders
//! and across runs, and it can be computed before the body is fetched.

use std::fmt;

use sha2::{Digest as _, Sha224};

/// Length of a digest in bytes.
pub const DIGEST_LEN: usize = 28;

/// Identity digest of a message header.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Computes the digest of a header section.
    #[must_use]
    pub fn of_header(header: &[u8]) -> Self {
        let mut hasher = Sha224::new();
        let mut start = 0;
        for (i, &byte) in header.iter().enumerate() {
            if byte == b'\n' && (i == 0 || header[i - 1] != b'\r') {
                hasher.update(&header[start..i]);
                hasher.update(b"\r\n");
                start = i + 1;
            }
        }
        hasher.update(&header[start..]);
        let mut bytes = [0; DIGEST_LEN];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }

    /// Computes the digest of a complete message from its header section.
    #[must_use]
    pub fn of_message(message: &[u8]) -> Self {
        Self::of_header(header_section(message))
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

/// Returns the header section of a raw message.
///
/// The section runs up to and including the first empty line. A message
/// without an empty line is all header.
#[must_use]
pub fn header_section(message: &[u8]) -> &[u8] {
    let mut line_start = 0;
    while line_start < message.len() {
        let line_end = message[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(message.len(), |p| line_start + p + 1);
        let line = &message[line_start..line_end];
        if line == b"\r\n" || line == b"\n" {
            return &message[..line_end];
        }
        line_start = line_end;
    }
    message
}
