//! Error types for the mirroring loop
//!
//! Every failure a cycle can run into is one of these variants, and none of
//! them is fatal: the daemon logs it and moves on to the next tick. Startup
//! problems (missing config file, invalid values) go through `anyhow` instead.

/// Result type alias for mirroring operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while polling, resolving, or enqueueing
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The scrobbling service could not be reached or answered with an error
    #[error("scrobbling source unavailable: {0}")]
    SourceUnavailable(String),

    /// No video could be found for a track
    #[error("could not resolve '{artist} - {title}': {reason}")]
    Resolution {
        artist: String,
        title: String,
        reason: String,
    },

    /// No associated video and no search API key to fall back on
    #[error("no associated video for '{artist} - {title}' and no search key configured")]
    NoFallbackConfigured { artist: String, title: String },

    /// Connection to the player was refused, reset, or closed
    #[error("player unreachable: {0}")]
    PlayerUnreachable(String),

    /// The player answered with something we do not understand
    #[error("player protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Create a resolution error for a track
    pub fn resolution(artist: &str, title: &str, reason: impl Into<String>) -> Self {
        Self::Resolution {
            artist: artist.to_string(),
            title: title.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a missing-fallback error for a track
    pub fn no_fallback(artist: &str, title: &str) -> Self {
        Self::NoFallbackConfigured {
            artist: artist.to_string(),
            title: title.to_string(),
        }
    }

    /// True for failures that only affect a single track
    pub fn is_per_track(&self) -> bool {
        matches!(self, Self::Resolution { .. } | Self::NoFallbackConfigured { .. })
    }

    /// True for failures talking to the player
    pub fn is_player(&self) -> bool {
        matches!(self, Self::PlayerUnreachable(_) | Self::Protocol(_))
    }
}
