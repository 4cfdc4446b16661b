//! Command-line interface.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Archive IMAP mailboxes into local, deduplicated maildirs.
#[derive(Debug, Parser)]
#[command(name = "imapfetch", version, about)]
pub struct Cli {
    /// Configuration file with one section per account.
    pub config: PathBuf,

    /// Sections to process; all sections when omitted.
    pub sections: Vec<String>,

    /// Ignore resume marks and check every message again.
    #[arg(short, long)]
    pub full: bool,

    /// Only list each account's folders.
    #[arg(short, long)]
    pub list: bool,

    /// More logging; repeat for more detail.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Number of accounts to synchronize at once.
    #[arg(short, long, default_value = "1")]
    pub jobs: NonZeroUsize,
}

impl Cli {
    /// Default log filter for the chosen verbosity.
    #[must_use]
    pub fn log_filter(&self) -> String {
        let level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        format!("imapfetch={level},imapfetch_core={level},imapfetch_imap={level}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["imapfetch", "archive.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("archive.toml"));
        assert!(cli.sections.is_empty());
        assert!(!cli.full);
        assert!(!cli.list);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.jobs.get(), 1);
        assert_eq!(
            cli.log_filter(),
            "imapfetch=warn,imapfetch_core=warn,imapfetch_imap=warn"
        );
    }

    #[test]
    fn test_flags_and_sections() {
        let cli = Cli::try_parse_from([
            "imapfetch",
            "-vv",
            "--full",
            "-j",
            "3",
            "archive.toml",
            "personal",
            "work",
        ])
        .unwrap();
        assert!(cli.full);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.jobs.get(), 3);
        assert_eq!(cli.sections, vec!["personal", "work"]);
        assert!(cli.log_filter().starts_with("imapfetch=debug"));
    }

    #[test]
    fn test_zero_jobs_rejected() {
        assert!(Cli::try_parse_from(["imapfetch", "-j", "0", "archive.toml"]).is_err());
    }

    #[test]
    fn test_config_required() {
        assert!(Cli::try_parse_from(["imapfetch", "--list"]).is_err());
    }
}
