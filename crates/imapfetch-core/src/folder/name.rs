//! Mapping server folder names to local maildir directory names.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::error::{Error, Result};

/// Everything but the URL unreserved characters is escaped.
const LOCAL_NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Maps a folder name to the directory name of its maildir.
///
/// Without `quoting` the hierarchy delimiter and `/` both become `.`, the
/// maildir++ convention. With `quoting` the name is percent-encoded, which
/// [`decode_local_name`] reverses exactly.
///
/// # Errors
///
/// Returns `Error::Protocol` if the mapped name could escape the archive
/// root: empty, `.`, `..`, or containing a path separator.
pub fn local_name(folder: &str, delimiter: Option<char>, quoting: bool) -> Result<String> {
    let local = if quoting {
        utf8_percent_encode(folder, LOCAL_NAME).to_string()
    } else {
        folder
            .chars()
            .map(|c| if c == '/' || Some(c) == delimiter { '.' } else { c })
            .collect()
    };

    if local.is_empty() || local == "." || local == ".." || local.contains(std::path::is_separator)
    {
        return Err(Error::Protocol(format!(
            "folder {folder:?} has no safe local name (got {local:?})"
        )));
    }
    Ok(local)
}

/// Recovers the folder name from a percent-encoded directory name.
///
/// # Errors
///
/// Returns `Error::Protocol` if the decoded bytes are not UTF-8.
pub fn decode_local_name(local: &str) -> Result<String> {
    percent_decode_str(local)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| Error::Protocol(format!("directory {local:?} is not an encoded folder: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_mapping_flattens_hierarchy() {
        assert_eq!(local_name("INBOX", Some('/'), false).unwrap(), "INBOX");
        assert_eq!(
            local_name("Archive/2019", Some('/'), false).unwrap(),
            "Archive.2019"
        );
        assert_eq!(
            local_name("INBOX.Lists.rust", Some('.'), false).unwrap(),
            "INBOX.Lists.rust"
        );
        assert_eq!(
            local_name("Work\\Clients", Some('\\'), false).unwrap(),
            "Work.Clients"
        );
    }

    #[test]
    fn test_quoting_escapes_unsafe_characters() {
        let local = local_name("Archive/Entwürfe 2019", Some('/'), true).unwrap();
        assert_eq!(local, "Archive%2FEntw%C3%BCrfe%202019");
        assert_eq!(decode_local_name(&local).unwrap(), "Archive/Entwürfe 2019");
    }

    #[test]
    fn test_unsafe_names_rejected() {
        for name in ["", ".", ".."] {
            let err = local_name(name, Some('/'), false).unwrap_err();
            assert!(matches!(err, Error::Protocol(_)), "{name:?}");
        }
        assert!(local_name("..", Some('/'), true).is_err());
        assert!(local_name("/", Some('/'), false).is_err());
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        assert!(decode_local_name("%FF%FE").is_err());
    }

    proptest! {
        #[test]
        fn prop_quoting_is_reversible(name in "\\PC{1,40}") {
            prop_assume!(name != "." && name != "..");
            let local = local_name(&name, Some('/'), true).unwrap();
            prop_assert!(!local.contains('/'));
            prop_assert_eq!(decode_local_name(&local).unwrap(), name);
        }
    }
}
