//! # Mirroring Daemon
//!
//! Drives the whole loop: poll the feed, resolve and enqueue new tracks,
//! pick the next interval, sleep, repeat.
//!
//! ## Architecture
//!
//! The loop is single-threaded and single-flight. The sleep between cycles is
//! the only suspension point, so no two polls ever overlap and nothing needs
//! locking. Every expected failure (feed down, unresolvable track, player
//! gone) is logged and absorbed inside the cycle; the next tick always comes.
//! The process stops only when it receives a termination signal.

use crate::config::Config;
use crate::http;
use crate::lastfm::{LastFmClient, ScrobbleSource};
use crate::poller::{ActivityPoller, PollResult};
use crate::resolver::VideoResolver;
use crate::scheduler::{AdaptiveScheduler, PollingMode};
use crate::track::PlayedAt;
use crate::vlc_client::{Player, VlcClient};
use crate::youtube::{VideoSearch, YouTubeSearch};
use chrono::{DateTime, Local, TimeZone};
use log::{debug, info, warn};
use std::rc::Rc;
use std::time::Duration;

/// Owns every component of the loop
pub struct MirrorDaemon {
    poller: ActivityPoller,
    resolver: VideoResolver,
    player: Box<dyn Player>,
    scheduler: AdaptiveScheduler,
}

impl MirrorDaemon {
    /// Assemble a daemon from already built components
    pub fn new(
        poller: ActivityPoller,
        resolver: VideoResolver,
        player: Box<dyn Player>,
        scheduler: AdaptiveScheduler,
    ) -> Self {
        Self {
            poller,
            resolver,
            player,
            scheduler,
        }
    }

    /// Wire up the Last.fm, YouTube and VLC clients described by `config`
    pub fn from_config(config: &Config) -> Self {
        let agent = http::agent(config.http_timeout());

        let source: Rc<dyn ScrobbleSource> = Rc::new(LastFmClient::new(
            agent.clone(),
            &config.lastfm_user,
            &config.lastfm_key,
            config.http_retries,
        ));

        let search = config.youtube_key.as_deref().map(|key| {
            Box::new(YouTubeSearch::new(agent.clone(), key, config.http_retries)) as Box<dyn VideoSearch>
        });
        if search.is_none() {
            warn!("No youtube_key configured, tracks without a Last.fm video will be skipped");
        }

        let poller = ActivityPoller::new(Rc::clone(&source), config.feed_limit);
        let resolver = VideoResolver::new(source, search, config.resolve_cache_ttl());
        let player = VlcClient::new(&config.host, config.port, config.player_timeout());
        let scheduler = AdaptiveScheduler::new(config.active_delay(), config.idle_delay());

        Self::new(poller, resolver, Box::new(player), scheduler)
    }

    pub fn mode(&self) -> PollingMode {
        self.scheduler.mode()
    }

    pub fn poller(&self) -> &ActivityPoller {
        &self.poller
    }

    /// Log what the player is doing, mostly to surface a wrong host/port early
    pub fn check_player(&mut self) {
        match self.player.currently_playing() {
            Ok(Some(status)) => {
                let input = status.input.as_deref().unwrap_or("nothing");
                info!("Player is {:?}: {input}", status.state);
            }
            Ok(None) => info!("Player is idle"),
            Err(e) => warn!("Player not available yet, will retry on every poll: {e}"),
        }
    }

    /// Run one poll/resolve/enqueue cycle and return the delay before the next
    pub fn run_cycle(&mut self) -> Duration {
        let was_active = match self.poller.poll_once() {
            Ok(poll) => {
                let report = self
                    .poller
                    .process(&poll, &mut self.resolver, self.player.as_mut());
                debug!(
                    "Cycle done: {} enqueued, {} skipped, {} deferred",
                    report.enqueued.len(),
                    report.skipped,
                    report.deferred
                );
                log_last_played(&poll);
                poll.was_active
            }
            Err(e) => {
                // Keep the current mode; a failed fetch says nothing about the user
                let previous = self.scheduler.state().last_poll_was_active;
                warn!("Skipping cycle: {e}");
                previous
            }
        };

        let delay = self.scheduler.record(was_active);
        match wake_time(Local::now(), delay) {
            Some(wake) => info!("[{}] next update @ {}", self.scheduler.mode(), time_hms(&wake)),
            None => info!("[{}] next update in {}s", self.scheduler.mode(), delay.as_secs()),
        }
        delay
    }

    /// Poll forever
    pub fn run(&mut self) -> ! {
        info!("Starting mirror loop");
        self.check_player();
        loop {
            let delay = self.run_cycle();
            std::thread::sleep(delay);
        }
    }
}

fn log_last_played(poll: &PollResult) {
    let now = Local::now();
    let last_played = match poll.tracks.first().map(|track| track.played_at) {
        Some(PlayedAt::NowPlaying) => Some(now),
        Some(PlayedAt::Scrobbled(uts)) => Local.timestamp_opt(uts, 0).single(),
        None => None,
    };

    match last_played {
        Some(when) => info!("{} | last played: {}", time_hms(&now), time_hms(&when)),
        None => info!("{} | nothing played yet", time_hms(&now)),
    }
}

/// Wall-clock time `delay` after `now`, if representable
fn wake_time(now: DateTime<Local>, delay: Duration) -> Option<DateTime<Local>> {
    let delay = chrono::Duration::from_std(delay).ok()?;
    now.checked_add_signed(delay)
}

/// Format as HH:MM:SS
fn time_hms(when: &DateTime<Local>) -> String {
    when.format("%H:%M:%S").to_string()
}
