//! Folder exclusion and selection.

use glob::{MatchOptions, Pattern, PatternError};
use imapfetch_imap::Mailbox;

use crate::error::{Error, Result};

/// Shell-style matching: `*` crosses hierarchy separators, names are
/// compared case-sensitively and a leading dot is not special.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A compiled set of exclusion patterns for one account.
#[derive(Debug, Clone, Default)]
pub struct FolderFilter {
    patterns: Vec<Pattern>,
}

impl FolderFilter {
    /// Compiles a single glob pattern.
    ///
    /// # Errors
    ///
    /// Returns the glob parser's error for a malformed pattern.
    pub fn compile(pattern: &str) -> std::result::Result<Pattern, PatternError> {
        Pattern::new(pattern)
    }

    /// Compiles all exclusion patterns of an account.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first malformed pattern.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Self::compile(p)
                    .map_err(|e| Error::Config(format!("invalid exclude pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Returns the first pattern excluding `folder`, if any.
    ///
    /// Patterns are anchored to the full folder path as the server names
    /// it, hierarchy separator included.
    #[must_use]
    pub fn excluded_by(&self, folder: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.matches_with(folder, MATCH_OPTIONS))
            .map(Pattern::as_str)
    }

    /// Selects the folders to synchronize from the server's list, keeping
    /// its order.
    #[must_use]
    pub fn select(&self, folders: Vec<Mailbox>) -> Vec<Mailbox> {
        folders
            .into_iter()
            .filter(|f| match self.excluded_by(&f.name) {
                Some(pattern) => {
                    tracing::debug!(folder = %f.name, pattern, "Folder excluded");
                    false
                }
                None => true,
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn folders(names: &[&str]) -> Vec<Mailbox> {
        names
            .iter()
            .map(|n| Mailbox::from_raw(*n, Some('/')))
            .collect()
    }

    fn select<S: AsRef<str>>(folders: Vec<Mailbox>, exclude: &[S]) -> Result<Vec<Mailbox>> {
        Ok(FolderFilter::new(exclude)?.select(folders))
    }

    fn names(folders: &[Mailbox]) -> Vec<&str> {
        folders.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_empty_patterns_select_everything() {
        let all = folders(&["INBOX", "Sent", "Trash"]);
        let selected = select::<&str>(all, &[]).unwrap();
        assert_eq!(names(&selected), vec!["INBOX", "Sent", "Trash"]);
    }

    #[test]
    fn test_exact_match_is_anchored() {
        let all = folders(&["Trash", "Trash/Old", "OldTrash"]);
        let selected = select(all, &["Trash"]).unwrap();
        assert_eq!(names(&selected), vec!["Trash/Old", "OldTrash"]);
    }

    #[test]
    fn test_wildcard_crosses_separator() {
        let all = folders(&["INBOX", "Archive", "Archive/2019", "Archive/2019/Q1"]);
        let selected = select(all, &["Archive/*"]).unwrap();
        assert_eq!(names(&selected), vec!["INBOX", "Archive"]);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let all = folders(&["Spam", "spam"]);
        let selected = select(all, &["spam"]).unwrap();
        assert_eq!(names(&selected), vec!["Spam"]);
    }

    #[test]
    fn test_character_classes() {
        let filter = FolderFilter::new(&["Lists/[a-c]*", "Drafts?"]).unwrap();
        assert_eq!(filter.excluded_by("Lists/announce"), Some("Lists/[a-c]*"));
        assert_eq!(filter.excluded_by("Lists/rust"), None);
        assert_eq!(filter.excluded_by("Drafts2"), Some("Drafts?"));
        assert_eq!(filter.excluded_by("Drafts"), None);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let all = folders(&["INBOX"]);
        let err = select(all, &["INBOX", "[unclosed"]).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("[unclosed")));
    }

    proptest! {
        #[test]
        fn prop_selection_preserves_order_and_drops_only_matches(
            raw in proptest::collection::btree_set("[A-Za-z]{1,6}(/[A-Za-z]{1,6})?", 0..12),
        ) {
            let names_in: Vec<String> = raw.into_iter().collect();
            let all: Vec<Mailbox> = names_in
                .iter()
                .map(|n| Mailbox::from_raw(n.clone(), Some('/')))
                .collect();
            let filter = FolderFilter::new(&["A*", "*/b*"]).unwrap();
            let selected = filter.select(all);

            let expected: Vec<&String> =
                names_in.iter().filter(|n| filter.excluded_by(n).is_none()).collect();
            let actual: Vec<&String> = selected.iter().map(|f| &f.name).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
