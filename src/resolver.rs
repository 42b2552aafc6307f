//! # Video Resolution
//!
//! Maps an artist/title pair to a playable YouTube video.
//!
//! 1. Ask the scrobbling source for the video it already associates with the
//!    track. A hit returns immediately and never touches the search API, which
//!    keeps the (quota limited) search key for tracks that need it.
//! 2. Otherwise search for `"artist title"` and take the first video in the
//!    search API's own ranking.
//! 3. Without a search key, fail fast with [`Error::NoFallbackConfigured`].
//!
//! Successful resolutions are memoised for a short while per resolver, so a
//! track bouncing in and out of the feed does not cost a second lookup.

use crate::error::{Error, Result};
use crate::lastfm::ScrobbleSource;
use crate::track::{Track, TrackIdentity, VideoReference};
use crate::youtube::VideoSearch;
use log::{debug, info};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Most entries kept in the memo cache
const CACHE_CAPACITY: usize = 256;

/// Where a resolved video came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Associated with the track by the scrobbling service
    Associated,
    /// Top result of the fallback search
    Search,
    /// Memo cache
    Cached,
}

/// Resolves tracks to videos, primary source first, search second
pub struct VideoResolver {
    source: Rc<dyn ScrobbleSource>,
    search: Option<Box<dyn VideoSearch>>,
    cache_ttl: Duration,
    cache: HashMap<TrackIdentity, (VideoReference, Instant)>,
}

impl VideoResolver {
    /// Create a resolver; `search = None` disables the fallback and
    /// `cache_ttl = 0` disables memoisation.
    pub fn new(
        source: Rc<dyn ScrobbleSource>,
        search: Option<Box<dyn VideoSearch>>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            source,
            search,
            cache_ttl,
            cache: HashMap::new(),
        }
    }

    pub fn has_fallback(&self) -> bool {
        self.search.is_some()
    }

    /// Resolve `artist`/`title` to a video.
    ///
    /// # Errors
    ///
    /// - [`Error::Resolution`] if a lookup fails or the search has no video
    /// - [`Error::NoFallbackConfigured`] if there is no associated video and
    ///   no search backend
    pub fn resolve(&mut self, artist: &str, title: &str) -> Result<VideoReference> {
        self.resolve_with_origin(artist, title).map(|(video, _)| video)
    }

    /// Resolve a feed entry, using a video id the feed already carries
    pub fn resolve_track(&mut self, track: &Track) -> Result<VideoReference> {
        if let Some(video_id) = &track.associated_video_id {
            debug!("Feed already carries video {video_id} for {track}");
            return Ok(VideoReference::from_video_id(video_id));
        }
        self.resolve(&track.artist, &track.title)
    }

    /// Like [`resolve`](Self::resolve), also reporting where the video came from
    pub fn resolve_with_origin(&mut self, artist: &str, title: &str) -> Result<(VideoReference, Origin)> {
        let key = TrackIdentity::new(artist, title);

        if let Some(video) = self.cached(&key) {
            debug!("Memo hit for {key}: {}", video.video_id);
            return Ok((video, Origin::Cached));
        }

        let (video, origin) = self.lookup(artist, title)?;
        self.remember(key, &video);
        Ok((video, origin))
    }

    fn lookup(&self, artist: &str, title: &str) -> Result<(VideoReference, Origin)> {
        if let Some(video_id) = self.source.track_video(artist, title)? {
            debug!("Associated video for {artist} - {title}: {video_id}");
            return Ok((VideoReference::from_video_id(&video_id), Origin::Associated));
        }

        let search = self
            .search
            .as_ref()
            .ok_or_else(|| Error::no_fallback(artist, title))?;

        let query = format!("{artist} {title}");
        let ids = search
            .search(&query)
            .map_err(|reason| Error::resolution(artist, title, reason))?;

        let video_id = ids
            .into_iter()
            .next()
            .ok_or_else(|| Error::resolution(artist, title, "search returned no videos"))?;

        info!("Resolved {artist} - {title} via search: {video_id}");
        Ok((VideoReference::from_video_id(&video_id), Origin::Search))
    }

    fn cached(&self, key: &TrackIdentity) -> Option<VideoReference> {
        if self.cache_ttl.is_zero() {
            return None;
        }
        self.cache
            .get(key)
            .filter(|(_, stored)| stored.elapsed() < self.cache_ttl)
            .map(|(video, _)| video.clone())
    }

    fn remember(&mut self, key: TrackIdentity, video: &VideoReference) {
        if self.cache_ttl.is_zero() {
            return;
        }

        let ttl = self.cache_ttl;
        self.cache.retain(|_, (_, stored)| stored.elapsed() < ttl);
        if self.cache.len() >= CACHE_CAPACITY {
            // Still full after expiry: drop the oldest entry
            if let Some(oldest) = self
                .cache
                .iter()
                .min_by_key(|(_, (_, stored))| *stored)
                .map(|(key, _)| key.clone())
            {
                self.cache.remove(&oldest);
            }
        }

        self.cache.insert(key, (video.clone(), Instant::now()));
    }
}
