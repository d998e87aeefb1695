//! Fair billing CLI library.
//!
//! This crate provides the CLI interface for fair billing.

mod cli;
mod config;
pub mod report;

pub use cli::Cli;
pub use config::{Config, OutputFormat};
