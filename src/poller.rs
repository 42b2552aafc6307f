//! # Activity Poller
//!
//! Fetches the user's recent tracks and feeds the ones not yet enqueued to
//! the resolver and the player.
//!
//! ## Deduplication
//!
//! The poller remembers a single play: the last one it handed off. The feed is
//! newest first, so everything above that play is new. New tracks are
//! enqueued oldest first to keep the playlist in listening order.
//!
//! A play is found again by its identity plus its position in time. A
//! scrobbled play is matched on its scrobble timestamp. A now-playing play has
//! no timestamp yet, so the poller notes the newest scrobble below it and later
//! matches the oldest entry of the same identity that is still playing or was
//! scrobbled after that. A replay of the same track is then seen as new.
//!
//! - First poll (nothing remembered): only the newest track, never the whole
//!   history.
//! - Remembered track fell out of the fetched window: every fetched track is
//!   new (bounded by the feed limit).
//! - Consecutive entries with the same identity (now-playing plus its own
//!   scrobble) collapse into one.
//!
//! ## Failures
//!
//! - A track that cannot be resolved is logged and skipped, and the memory
//!   moves past it so it is not looked up again on every poll.
//! - A player failure stops the cycle; the memory stays on the last track
//!   that made it into the player, so the rest is retried next tick.

use crate::error::Result;
use crate::lastfm::ScrobbleSource;
use crate::resolver::VideoResolver;
use crate::track::{PlayedAt, Track, TrackIdentity, VideoReference};
use crate::vlc_client::Player;
use log::{debug, error, info, warn};
use std::rc::Rc;

/// Outcome of one feed fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    /// Recent tracks, newest first
    pub tracks: Vec<Track>,
    /// Newest entry is flagged as now playing
    pub was_active: bool,
}

/// What happened to the unseen tracks of one poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Videos accepted by the player, in enqueue order
    pub enqueued: Vec<VideoReference>,
    /// Tracks dropped because no video could be resolved
    pub skipped: usize,
    /// Tracks left for the next cycle after a player failure
    pub deferred: usize,
}

/// The last play handed off, and enough context to find it in a later feed
#[derive(Debug, Clone, PartialEq, Eq)]
struct Marker {
    identity: TrackIdentity,
    /// Scrobble time, when the play had already finished
    scrobbled_at: Option<i64>,
    /// Newest scrobble below the play while it was still playing
    after: Option<i64>,
}

impl Marker {
    fn for_track(track: &Track, feed: &[Track]) -> Self {
        let newest_scrobble = feed.iter().find_map(|entry| match entry.played_at {
            PlayedAt::Scrobbled(uts) => Some(uts),
            PlayedAt::NowPlaying => None,
        });
        let (scrobbled_at, after) = match track.played_at {
            PlayedAt::Scrobbled(uts) => (Some(uts), None),
            PlayedAt::NowPlaying => (None, newest_scrobble),
        };
        Self {
            identity: track.identity(),
            scrobbled_at,
            after,
        }
    }

    /// Index of the remembered play in a newest-first feed
    fn position(&self, tracks: &[Track]) -> Option<usize> {
        let same = |track: &Track| track.identity() == self.identity;
        match self.scrobbled_at {
            Some(uts) => tracks
                .iter()
                .position(|track| same(track) && track.played_at == PlayedAt::Scrobbled(uts)),
            None => tracks.iter().rposition(|track| {
                same(track)
                    && match track.played_at {
                        PlayedAt::NowPlaying => true,
                        PlayedAt::Scrobbled(uts) => self.after.map_or(true, |after| uts > after),
                    }
            }),
        }
    }
}

pub struct ActivityPoller {
    source: Rc<dyn ScrobbleSource>,
    limit: u32,
    marker: Option<Marker>,
}

impl ActivityPoller {
    pub fn new(source: Rc<dyn ScrobbleSource>, limit: u32) -> Self {
        Self::with_last_enqueued(source, limit, None)
    }

    /// Create a poller that already remembers `last_enqueued`.
    ///
    /// Without a timestamp the oldest matching entry of a feed is taken as
    /// the remembered play.
    pub fn with_last_enqueued(
        source: Rc<dyn ScrobbleSource>,
        limit: u32,
        last_enqueued: Option<TrackIdentity>,
    ) -> Self {
        Self {
            source,
            limit,
            marker: last_enqueued.map(|identity| Marker {
                identity,
                scrobbled_at: None,
                after: None,
            }),
        }
    }

    pub fn last_enqueued(&self) -> Option<&TrackIdentity> {
        self.marker.as_ref().map(|marker| &marker.identity)
    }

    /// Fetch the feed once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceUnavailable`](crate::error::Error::SourceUnavailable)
    /// if the scrobbling service cannot be queried.
    pub fn poll_once(&self) -> Result<PollResult> {
        let tracks = self.source.recent_tracks(self.limit)?;
        let was_active = tracks.first().is_some_and(Track::is_now_playing);
        debug!("Fetched {} recent tracks (active: {was_active})", tracks.len());
        Ok(PollResult { tracks, was_active })
    }

    /// Tracks of a newest-first feed not yet handed off, oldest first
    pub fn unseen<'a>(&self, tracks: &'a [Track]) -> Vec<&'a Track> {
        let Some(marker) = &self.marker else {
            return tracks.first().into_iter().collect();
        };

        let boundary = match marker.position(tracks) {
            Some(index) => index,
            None => {
                if !tracks.is_empty() {
                    warn!("Last enqueued track {} is no longer in the feed window", marker.identity);
                }
                tracks.len()
            }
        };

        let mut fresh: Vec<&Track> = tracks[..boundary].iter().rev().collect();
        fresh.dedup_by(|a, b| a.identity() == b.identity());
        fresh
    }

    /// Resolve and enqueue every unseen track of `poll`, oldest first.
    ///
    /// Never fails: every error is logged and reflected in the report.
    pub fn process(
        &mut self,
        poll: &PollResult,
        resolver: &mut VideoResolver,
        player: &mut dyn Player,
    ) -> CycleReport {
        let fresh: Vec<Track> = self.unseen(&poll.tracks).into_iter().cloned().collect();
        let mut report = CycleReport::default();

        for (index, track) in fresh.iter().enumerate() {
            let video = match resolver.resolve_track(track) {
                Ok(video) => video,
                Err(e) => {
                    if e.is_per_track() {
                        warn!("Skipping {track}: {e}");
                    } else {
                        error!("Skipping {track} after unexpected error: {e}");
                    }
                    report.skipped += 1;
                    self.marker = Some(Marker::for_track(track, &poll.tracks));
                    continue;
                }
            };

            match player.enqueue(&video) {
                Ok(_) => {
                    info!("[{}] Loaded {track}", video.video_id);
                    self.marker = Some(Marker::for_track(track, &poll.tracks));
                    report.enqueued.push(video);
                }
                Err(e) => {
                    report.deferred = fresh.len() - index;
                    warn!("Could not enqueue {track}, retrying {} track(s) next cycle: {e}", report.deferred);
                    break;
                }
            }
        }

        report
    }
}
