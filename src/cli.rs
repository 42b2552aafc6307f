//! # Command-Line Interface Module
//!
//! Mimi has a single command: `start`, which runs the mirroring loop until
//! the process is terminated.
//!
//! ## Examples
//!
//! ```bash
//! mimi start
//! mimi start --config ~/.config/mimi/config.json
//! RUST_LOG=debug mimi start
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "mimi")]
#[command(about = "Mimi: mirrors your Last.fm now playing into VLC as YouTube videos")]
#[command(version)]
pub struct Args {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start mirroring recent tracks into VLC
    ///
    /// Polls Last.fm, resolves every new track to a YouTube video and
    /// enqueues it in VLC through the rc interface. Runs until interrupted.
    Start {
        /// Path to the JSON configuration file
        ///
        /// Defaults to ./config.json, then the platform config directory.
        #[arg(long, short, env = "MIMI_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_without_config() {
        let args = Args::try_parse_from(["mimi", "start"]).expect("valid arguments");
        assert!(matches!(args.command, Command::Start { .. }));
    }

    #[test]
    fn test_start_with_config() {
        let args = Args::try_parse_from(["mimi", "start", "--config", "/tmp/mimi.json"]).expect("valid arguments");
        let Command::Start { config } = args.command;
        assert_eq!(config, Some(PathBuf::from("/tmp/mimi.json")));
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Args::try_parse_from(["mimi", "play"]).is_err());
        assert!(Args::try_parse_from(["mimi"]).is_err());
    }
}
