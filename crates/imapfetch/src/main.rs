//! `imapfetch` - archive IMAP mailboxes into local maildirs.
//!
//! Every message is stored once, however many folders or accounts hold
//! it, and each run only fetches what is new since the last one.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod config;
mod run;

use std::process::ExitCode;

use clap::Parser;
use imapfetch_core::SyncMode;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use config::Config;

/// Exit status after an interrupt, as a shell reports SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Configuration problems stop the run before any connection is made.
    let config = Config::load(&cli.config)?;
    let accounts = config.select(&cli.sections)?;
    info!(accounts = accounts.len(), "Starting imapfetch");

    let success = tokio::select! {
        success = async {
            if cli.list {
                run::list_all(&accounts).await
            } else {
                let mode = SyncMode::from_full_flag(cli.full);
                let report = run::sync_all(&accounts, mode, cli.jobs.get()).await;
                eprintln!("{report}");
                report.is_success()
            }
        } => success,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, abandoning folders in progress");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
