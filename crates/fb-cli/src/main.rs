use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fb_cli::{Cli, Config, report};
use fb_core::{TracingSink, bill_file};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
    tracing::debug!(?config, "loaded configuration");

    let summary = bill_file(&cli.path, &mut TracingSink);
    tracing::debug!(
        path = %cli.path.display(),
        users = summary.len(),
        "billing complete"
    );

    report::write_report(&mut io::stdout().lock(), &summary, &config)
        .context("failed to write report")?;

    Ok(())
}
