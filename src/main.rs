//! # Mimi
//!
//! Loads the YouTube videos of a Last.fm user's recent tracks into VLC, and
//! keeps doing so while they listen.
//!
//! ## Usage
//!
//! ```bash
//! # VLC with the rc interface enabled
//! vlc --extraintf rc --rc-host 127.0.0.1:4212
//!
//! # Mirror the user configured in config.json
//! mimi start
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use mimi::{cli, config, daemon};

/// Main entry point.
///
/// Loads configuration and hands control to the daemon loop, which only
/// returns through process termination. Configuration problems are the one
/// fatal error and surface through the returned `Result`.
///
/// # Logging
///
/// Controlled via `RUST_LOG`, defaulting to `info`:
/// - `RUST_LOG=debug mimi start` - Show every request and protocol line
/// - `RUST_LOG=mimi::vlc_client=debug mimi start` - Module-specific logging
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = cli::Args::parse();

    match args.command {
        cli::Command::Start { config: explicit } => {
            let path = config::locate(explicit.as_deref())?;
            let config = config::Config::load(&path)
                .with_context(|| format!("Cannot start with configuration {}", path.display()))?;
            info!(
                "Mirroring Last.fm user '{}' into VLC at {}:{}",
                config.lastfm_user, config.host, config.port
            );

            let mut daemon = daemon::MirrorDaemon::from_config(&config);
            daemon.run()
        }
    }
}
