//! # Configuration Module
//!
//! Loads the JSON configuration file that tells mimi which Last.fm user to
//! follow and where VLC's rc interface listens.
//!
//! ## File Location
//!
//! The first existing file wins:
//! 1. `--config PATH` (or `MIMI_CONFIG`)
//! 2. `./config.json`
//! 3. The platform config directory:
//!    - Linux: `~/.config/mimi/config.json`
//!    - macOS: `~/Library/Application Support/mimi/config.json`
//!    - Windows: `%APPDATA%\mimi\config.json`
//!
//! ## Example
//!
//! ```json
//! {
//!   "host": "127.0.0.1",
//!   "port": 4212,
//!   "lastfm_user": "someone",
//!   "lastfm_key": "0123456789abcdef",
//!   "youtube_key": "AIza...",
//!   "active_poll_secs": 15,
//!   "idle_poll_secs": 120
//! }
//! ```
//!
//! The rc interface is unauthenticated; keep `host` on loopback unless you
//! know what you are doing.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Longest accepted poll interval (one day)
pub const MAX_POLL_SECS: u64 = 86_400;

/// Runtime configuration read from `config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Host VLC's rc interface listens on
    #[serde(default = "default_host")]
    pub host: String,
    /// Port of VLC's rc interface
    pub port: u16,
    /// Last.fm user whose activity is mirrored
    pub lastfm_user: String,
    /// Last.fm API key
    pub lastfm_key: String,
    /// YouTube Data API key; without it there is no search fallback
    #[serde(default)]
    pub youtube_key: Option<String>,
    /// Poll interval while the user is listening
    #[serde(default = "default_active_poll_secs")]
    pub active_poll_secs: u64,
    /// Poll interval while nobody is listening
    #[serde(default = "default_idle_poll_secs")]
    pub idle_poll_secs: u64,
    /// How many recent tracks to fetch per poll
    #[serde(default = "default_feed_limit")]
    pub feed_limit: u32,
    /// Connect/read timeout for HTTP calls
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Retries for transient HTTP failures
    #[serde(default = "default_http_retries")]
    pub http_retries: u32,
    /// Socket timeout for the rc connection
    #[serde(default = "default_player_timeout_secs")]
    pub player_timeout_secs: u64,
    /// How long a resolved video is remembered, 0 disables
    #[serde(default = "default_resolve_cache_secs")]
    pub resolve_cache_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_active_poll_secs() -> u64 {
    15
}

fn default_idle_poll_secs() -> u64 {
    120
}

fn default_feed_limit() -> u32 {
    10
}

fn default_http_timeout_secs() -> u64 {
    5
}

fn default_http_retries() -> u32 {
    2
}

fn default_player_timeout_secs() -> u64 {
    3
}

fn default_resolve_cache_secs() -> u64 {
    900
}

impl Config {
    /// Read and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not valid JSON, misses a
    /// required field, or holds values rejected by [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let mut config: Config = serde_json::from_str(content).context("Malformed configuration JSON")?;

        // An empty key is the same as no key
        if config.youtube_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
            config.youtube_key = None;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the loop misbehave
    pub fn validate(&self) -> Result<()> {
        if self.lastfm_user.trim().is_empty() {
            bail!("lastfm_user must not be empty");
        }
        if self.lastfm_key.trim().is_empty() {
            bail!("lastfm_key must not be empty");
        }
        if self.host.trim().is_empty() {
            bail!("host must not be empty");
        }
        if self.port == 0 {
            bail!("port must be non-zero");
        }
        if self.active_poll_secs == 0 || self.idle_poll_secs == 0 {
            bail!("poll intervals must be at least one second");
        }
        if self.idle_poll_secs > MAX_POLL_SECS {
            bail!(
                "idle_poll_secs must be at most {MAX_POLL_SECS}, got {}",
                self.idle_poll_secs
            );
        }
        if self.active_poll_secs > self.idle_poll_secs {
            bail!(
                "active_poll_secs ({}) must not exceed idle_poll_secs ({})",
                self.active_poll_secs,
                self.idle_poll_secs
            );
        }
        if !(1..=200).contains(&self.feed_limit) {
            bail!("feed_limit must be between 1 and 200, got {}", self.feed_limit);
        }
        if self.http_timeout_secs == 0 || self.player_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        Ok(())
    }

    pub fn active_delay(&self) -> Duration {
        Duration::from_secs(self.active_poll_secs)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_secs(self.idle_poll_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn player_timeout(&self) -> Duration {
        Duration::from_secs(self.player_timeout_secs)
    }

    pub fn resolve_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.resolve_cache_secs)
    }
}

/// Default location of the config file in the platform config directory.
///
/// # Errors
///
/// Fails if the platform config directory cannot be determined.
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system config directory. Pass --config to point at a config file."
        )
    })?;

    Ok(config_dir.join("mimi").join(CONFIG_FILE_NAME))
}

/// Pick the config file to load: explicit path, then `./config.json`, then
/// the platform default.
///
/// # Errors
///
/// Fails if an explicit path does not exist or no candidate exists.
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("Config file {} does not exist", path.display());
        }
        return Ok(path.to_path_buf());
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(local);
    }

    let platform = get_config_path()?;
    if platform.exists() {
        return Ok(platform);
    }

    bail!(
        "No configuration found. Create {} or {}, or pass --config",
        local.display(),
        platform.display()
    )
}
