//! MoodMixer - an AI-assisted mirror of a remote music library.
//!
//! Syncs a Plex-compatible media server into a local SQLite mirror,
//! enriches tracks with AI-generated tags and vector embeddings, and
//! builds mood playlists from natural-language queries.

pub mod ai;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod model;
pub mod playlist;
pub mod progress;
pub mod remote;
pub mod sync;
#[cfg(test)]
pub mod test_utils;

use clap::{CommandFactory, Parser};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("moodmixer=info".parse().unwrap()))
        .init();

    // Try to run a CLI command; without one, show usage
    if cli::run_command(&args)? {
        return Ok(());
    }

    cli::Cli::command().print_help()?;
    Ok(())
}
