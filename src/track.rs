//! Tracks as reported by the scrobbling service, and the videos they map to.

use std::fmt;

/// Prefix of a playable YouTube watch URL
const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// When a feed entry was played
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayedAt {
    /// Currently in progress, no timestamp yet
    NowPlaying,
    /// Finished play, UNIX seconds
    Scrobbled(i64),
}

/// One entry of the user's recent-tracks feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub artist: String,
    pub title: String,
    pub played_at: PlayedAt,
    /// Video id the feed already associates with this track, if any
    pub associated_video_id: Option<String>,
}

impl Track {
    /// Create a finished scrobble
    pub fn scrobbled(artist: &str, title: &str, uts: i64) -> Self {
        Self {
            artist: artist.to_string(),
            title: title.to_string(),
            played_at: PlayedAt::Scrobbled(uts),
            associated_video_id: None,
        }
    }

    /// Create a track that is playing right now
    pub fn now_playing(artist: &str, title: &str) -> Self {
        Self {
            artist: artist.to_string(),
            title: title.to_string(),
            played_at: PlayedAt::NowPlaying,
            associated_video_id: None,
        }
    }

    pub fn is_now_playing(&self) -> bool {
        self.played_at == PlayedAt::NowPlaying
    }

    /// Identity used to avoid enqueueing the same track twice in a row
    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity {
            artist: self.artist.clone(),
            title: self.title.clone(),
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// Dedup key of a track.
///
/// Excludes the timestamp: a play shows up first as now-playing (no
/// timestamp) and later as a scrobble with one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackIdentity {
    pub artist: String,
    pub title: String,
}

impl TrackIdentity {
    pub fn new(artist: &str, title: &str) -> Self {
        Self {
            artist: artist.to_string(),
            title: title.to_string(),
        }
    }
}

impl fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// A playable video, ready to be handed to the player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    pub video_id: String,
    pub source_url: String,
}

impl VideoReference {
    /// Build a reference from a bare YouTube video id
    pub fn from_video_id(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            source_url: format!("{WATCH_URL_PREFIX}{video_id}"),
        }
    }

    /// Build a reference from a YouTube watch URL.
    ///
    /// Accepts `watch?v=` URLs (extra query parameters are dropped) and
    /// `youtu.be/` short links. Returns `None` for anything else.
    pub fn from_url(url: &str) -> Option<Self> {
        let id = if let Some(pos) = url.find("?v=").or_else(|| url.find("&v=")) {
            &url[pos + 3..]
        } else if let Some(pos) = url.find("youtu.be/") {
            &url[pos + "youtu.be/".len()..]
        } else {
            return None;
        };

        let id = id.split(['&', '#', '?']).next().unwrap_or_default();
        if id.is_empty() {
            return None;
        }
        Some(Self::from_video_id(id))
    }
}
