//! Configuration file loading.
//!
//! The file is TOML with one table per account:
//!
//! ```toml
//! [personal]
//! archive = "~/Mail/archive"
//! server = "imap.example.com"
//! username = "me@example.com"
//! password = "secret"
//! exclude = ["Trash", "Spam/*"]
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use imapfetch_core::{Account, Error, validate_account};

/// All accounts of a configuration file, in file order.
#[derive(Debug, Clone)]
pub struct Config {
    /// Accounts keyed by their section name.
    pub accounts: Vec<Account>,
}

impl Config {
    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read configuration {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid configuration {}", path.display()))
    }

    /// Parses configuration text.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed TOML, unknown keys, or values of the
    /// wrong type.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let table: toml::Table = toml::from_str(text)?;
        let accounts = table
            .into_iter()
            .map(|(name, value)| {
                let mut account: Account = value
                    .try_into()
                    .with_context(|| format!("section [{name}]"))?;
                account.archive = expand_home(&account.archive);
                account.name = name;
                Ok(account)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { accounts })
    }

    /// Picks the accounts to process and validates them.
    ///
    /// An empty `sections` selects every account.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming every unknown section and every
    /// invalid field of the selected accounts.
    pub fn select(&self, sections: &[String]) -> Result<Vec<Account>, Error> {
        let mut problems = Vec::new();

        for section in sections {
            if !self.accounts.iter().any(|a| &a.name == section) {
                problems.push(format!("no section named [{section}]"));
            }
        }

        let selected: Vec<Account> = self
            .accounts
            .iter()
            .filter(|a| sections.is_empty() || sections.contains(&a.name))
            .cloned()
            .collect();

        for account in &selected {
            if let Err(errors) = validate_account(account) {
                problems.extend(
                    errors
                        .iter()
                        .map(|e| format!("[{}] {}: {e}", account.name, e.field())),
                );
            }
        }

        if selected.is_empty() && problems.is_empty() {
            problems.push("no accounts configured".to_string());
        }

        if problems.is_empty() {
            Ok(selected)
        } else {
            Err(Error::Config(problems.join("; ")))
        }
    }
}

/// Expands a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest)),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use imapfetch_core::Security;

    const EXAMPLE: &str = r#"
        [personal]
        archive = "/srv/mail/personal"
        server = "imap.example.com"
        username = "me@example.com"
        password = "secret"
        exclude = ["Trash", "Spam/*"]

        [work]
        archive = "~/Mail/work"
        server = "mail.example.org"
        port = 1143
        security = "plain"
        username = "me"
        password = "hunter2"
        incremental = false
        quoting = true
    "#;

    #[test]
    fn test_parse_keeps_file_order_and_defaults() {
        let config = Config::parse(EXAMPLE).unwrap();
        let names: Vec<_> = config.accounts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["personal", "work"]);

        let personal = &config.accounts[0];
        assert_eq!(personal.archive, PathBuf::from("/srv/mail/personal"));
        assert_eq!(personal.security, Security::Tls);
        assert_eq!(personal.port(), 993);
        assert_eq!(personal.exclude, vec!["Trash", "Spam/*"]);
        assert!(personal.incremental);
        assert!(!personal.quoting);

        let work = &config.accounts[1];
        assert_eq!(work.security, Security::Plain);
        assert_eq!(work.port(), 1143);
        assert!(!work.incremental);
        assert!(work.quoting);
    }

    #[test]
    fn test_home_is_expanded() {
        let config = Config::parse(EXAMPLE).unwrap();
        let work = &config.accounts[1];
        if let Some(home) = dirs::home_dir() {
            assert_eq!(work.archive, home.join("Mail/work"));
        }
        assert!(!work.archive.starts_with("~"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Config::parse(
            r#"
            [personal]
            archive = "/srv/mail"
            server = "imap.example.com"
            username = "me"
            password = "secret"
            folders = ["INBOX"]
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("[personal]"));
    }

    #[test]
    fn test_missing_key_rejected() {
        let err = Config::parse("[personal]\nserver = \"imap.example.com\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("[personal]"));
    }

    #[test]
    fn test_select_all_and_by_name() {
        let config = Config::parse(EXAMPLE).unwrap();
        assert_eq!(config.select(&[]).unwrap().len(), 2);

        let selected = config.select(&["work".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "work");
    }

    #[test]
    fn test_unknown_section_is_config_error() {
        let config = Config::parse(EXAMPLE).unwrap();
        let err = config
            .select(&["personal".to_string(), "holiday".to_string()])
            .unwrap_err();
        assert!(matches!(&err, Error::Config(msg) if msg.contains("[holiday]")));
    }

    #[test]
    fn test_validation_errors_are_collected() {
        let config = Config::parse(
            r#"
            [broken]
            archive = "/srv/mail"
            server = ""
            username = "me"
            password = ""
            exclude = ["[oops"]
            "#,
        )
        .unwrap();

        let Error::Config(msg) = config.select(&[]).unwrap_err() else {
            panic!("expected a configuration error");
        };
        assert!(msg.contains("[broken] server"));
        assert!(msg.contains("[broken] password"));
        assert!(msg.contains("[broken] exclude"));
    }

    #[test]
    fn test_empty_file_has_no_accounts() {
        let config = Config::parse("").unwrap();
        assert!(config.select(&[]).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imapfetch.toml");
        std::fs::write(&path, EXAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.accounts.len(), 2);

        let missing = Config::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(missing.to_string().contains("missing.toml"));
    }
}
