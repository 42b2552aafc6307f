//! Mirrors a Last.fm user's listening into VLC, one YouTube video per track.
//!
//! Core modules:
//! - [`poller`] - Recent-track polling and deduplication
//! - [`scheduler`] - Active/idle poll intervals
//! - [`resolver`] - Track to video resolution with search fallback
//! - [`vlc_client`] - VLC rc protocol client
//! - [`daemon`] - The single-flight mirroring loop
//!
//! ### Supporting Modules
//!
//! - [`lastfm`] - Last.fm recent tracks and associated videos
//! - [`youtube`] - YouTube Data API search
//! - [`http`] - Shared HTTP agent with bounded retries
//! - [`track`] - Tracks, identities and video references
//! - [`error`] - Error taxonomy of the loop
//! - [`config`] - JSON configuration loading
//! - [`cli`] - Command-line interface definitions with clap integration
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use mimi::{config::Config, daemon::MirrorDaemon};
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("config.json"))?;
//! let mut daemon = MirrorDaemon::from_config(&config);
//!
//! // One poll/resolve/enqueue cycle, returns the delay until the next one
//! let delay = daemon.run_cycle();
//! println!("next poll in {}s", delay.as_secs());
//!
//! // daemon.run(); // Runs indefinitely
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Component operations return [`error::Result`]; none of the variants stop
//! the loop. Configuration loading returns `anyhow::Result` and is the only
//! fatal path.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod http;
pub mod lastfm;
pub mod poller;
pub mod resolver;
pub mod scheduler;
pub mod track;
pub mod vlc_client;
pub mod youtube;
