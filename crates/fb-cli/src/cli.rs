//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;

/// Fair billing for login sessions.
///
/// Reads a log of `HH:MM:SS <user> <Start|End>` lines and prints each user's
/// session count and total connected seconds.
#[derive(Debug, Parser)]
#[command(
    name = "fairbilling",
    about,
    long_about = None,
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Session log to bill.
    pub path: PathBuf,
}
