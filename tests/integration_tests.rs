//! # Integration Tests for Mimi
//!
//! End-to-end scenarios through the public API: a scripted Last.fm feed and
//! search backend on one side, a fake VLC rc server on a real TCP socket on
//! the other, and the real poller, resolver, scheduler and VLC client between
//! them. Also a few checks of the binary's command line.

use mimi::daemon::MirrorDaemon;
use mimi::error::{Error, Result};
use mimi::lastfm::ScrobbleSource;
use mimi::poller::ActivityPoller;
use mimi::resolver::VideoResolver;
use mimi::scheduler::{AdaptiveScheduler, PollingMode};
use mimi::track::{Track, VideoReference};
use mimi::vlc_client::{Player, VlcClient};
use mimi::youtube::VideoSearch;
use std::cell::{Cell, RefCell};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::process::Command;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const ACTIVE: Duration = Duration::from_secs(10);
const IDLE: Duration = Duration::from_secs(90);

/// Feed that can be swapped between polls; associated videos by title
struct ScriptedFeed {
    tracks: RefCell<Vec<Track>>,
    videos: Vec<(String, String)>,
}

impl ScriptedFeed {
    fn new(tracks: Vec<Track>, videos: &[(&str, &str)]) -> Rc<Self> {
        Rc::new(Self {
            tracks: RefCell::new(tracks),
            videos: videos
                .iter()
                .map(|(title, id)| (title.to_string(), id.to_string()))
                .collect(),
        })
    }

    fn set(&self, tracks: Vec<Track>) {
        *self.tracks.borrow_mut() = tracks;
    }
}

impl ScrobbleSource for ScriptedFeed {
    fn recent_tracks(&self, limit: u32) -> Result<Vec<Track>> {
        Ok(self.tracks.borrow().iter().take(limit as usize).cloned().collect())
    }

    fn track_video(&self, _artist: &str, title: &str) -> Result<Option<String>> {
        Ok(self
            .videos
            .iter()
            .find(|(known, _)| known == title)
            .map(|(_, id)| id.clone()))
    }
}

/// Search backend with fixed results and a shared call counter
struct CountingSearch {
    ids: Vec<String>,
    calls: Rc<Cell<usize>>,
}

impl VideoSearch for CountingSearch {
    fn search(&self, _query: &str) -> std::result::Result<Vec<String>, String> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.ids.clone())
    }
}

/// Minimal VLC rc server; records every command line it receives.
/// Connections listed in `refuse` are closed right after accept.
fn spawn_fake_vlc(refuse: &'static [usize]) -> (u16, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake vlc");
    let port = listener.local_addr().expect("local addr").port();
    let commands = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&commands);

    thread::spawn(move || {
        for (n, stream) in listener.incoming().enumerate() {
            let Ok(mut stream) = stream else { break };
            if refuse.contains(&n) {
                continue;
            }
            let log = Arc::clone(&log);
            thread::spawn(move || {
                let banner = "VLC media player 3.0.20 Vetinari\nCommand Line Interface initialized. Type `help' for help.\n> ";
                if stream.write_all(banner.as_bytes()).is_err() {
                    return;
                }
                let reader = BufReader::new(stream.try_clone().expect("clone stream"));
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    log.lock().unwrap().push(line.clone());
                    let reply = if line == "status" { "( state stopped )\n> " } else { "> " };
                    if stream.write_all(reply.as_bytes()).is_err() {
                        break;
                    }
                }
            });
        }
    });

    (port, commands)
}

fn enqueued_urls(commands: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    commands
        .lock()
        .unwrap()
        .iter()
        .filter_map(|line| line.strip_prefix("enqueue ").map(str::to_string))
        .collect()
}

fn watch(id: &str) -> String {
    VideoReference::from_video_id(id).source_url
}

fn daemon_for(feed: &Rc<ScriptedFeed>, search: Option<Box<dyn VideoSearch>>, port: u16) -> MirrorDaemon {
    let poller = ActivityPoller::new(feed.clone(), 10);
    let resolver = VideoResolver::new(feed.clone(), search, Duration::ZERO);
    let player = VlcClient::new("127.0.0.1", port, Duration::from_secs(2));
    MirrorDaemon::new(poller, resolver, Box::new(player), AdaptiveScheduler::new(ACTIVE, IDLE))
}

#[cfg(test)]
mod mirror_tests {
    use super::*;

    #[test]
    fn test_first_poll_then_incremental() {
        let (port, commands) = spawn_fake_vlc(&[]);
        // Newest first: C is playing, B and A are history
        let feed = ScriptedFeed::new(
            vec![
                Track::now_playing("Artist", "C"),
                Track::scrobbled("Artist", "B", 200),
                Track::scrobbled("Artist", "A", 100),
            ],
            &[("A", "vidA"), ("B", "vidB"), ("C", "vidC"), ("D", "vidD")],
        );
        let mut daemon = daemon_for(&feed, None, port);

        assert_eq!(daemon.run_cycle(), ACTIVE);
        assert_eq!(daemon.mode(), PollingMode::Active);
        assert_eq!(enqueued_urls(&commands), vec![watch("vidC")]);

        feed.set(vec![
            Track::now_playing("Artist", "D"),
            Track::scrobbled("Artist", "C", 300),
            Track::scrobbled("Artist", "B", 200),
        ]);
        assert_eq!(daemon.run_cycle(), ACTIVE);
        assert_eq!(enqueued_urls(&commands), vec![watch("vidC"), watch("vidD")]);

        // Nothing new: nothing enqueued, and the user went quiet
        feed.set(vec![
            Track::scrobbled("Artist", "D", 400),
            Track::scrobbled("Artist", "C", 300),
        ]);
        assert_eq!(daemon.run_cycle(), IDLE);
        assert_eq!(daemon.mode(), PollingMode::Idle);
        assert_eq!(enqueued_urls(&commands).len(), 2);
    }

    #[test]
    fn test_fallback_search_enqueues_first_result() {
        let (port, commands) = spawn_fake_vlc(&[]);
        let feed = ScriptedFeed::new(vec![Track::now_playing("Obscure", "Demo")], &[]);
        let calls = Rc::new(Cell::new(0));
        let search = CountingSearch {
            ids: vec!["v1".to_string(), "v2".to_string()],
            calls: Rc::clone(&calls),
        };
        let mut daemon = daemon_for(&feed, Some(Box::new(search)), port);

        daemon.run_cycle();

        assert_eq!(enqueued_urls(&commands), vec![watch("v1")]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_associated_video_never_searches() {
        let (port, commands) = spawn_fake_vlc(&[]);
        let feed = ScriptedFeed::new(vec![Track::now_playing("Known", "Hit")], &[("Hit", "assoc")]);
        let calls = Rc::new(Cell::new(0));
        let search = CountingSearch {
            ids: vec!["v1".to_string()],
            calls: Rc::clone(&calls),
        };
        let mut daemon = daemon_for(&feed, Some(Box::new(search)), port);

        daemon.run_cycle();

        assert_eq!(enqueued_urls(&commands), vec![watch("assoc")]);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_missing_fallback_skips_track_but_keeps_going() {
        let (port, commands) = spawn_fake_vlc(&[]);
        let feed = ScriptedFeed::new(vec![Track::scrobbled("A", "Old", 1)], &[("Old", "old"), ("New", "new")]);
        let mut daemon = daemon_for(&feed, None, port);
        daemon.run_cycle();

        feed.set(vec![
            Track::now_playing("A", "New"),
            Track::scrobbled("A", "Unknown", 3),
            Track::scrobbled("A", "Old", 1),
        ]);
        daemon.run_cycle();

        assert_eq!(enqueued_urls(&commands), vec![watch("old"), watch("new")]);
    }

    #[test]
    fn test_player_outage_is_retried_next_cycle() {
        // First connection is dropped on accept, the player "comes back" after
        let (port, commands) = spawn_fake_vlc(&[0]);
        let feed = ScriptedFeed::new(vec![Track::now_playing("A", "Song")], &[("Song", "song")]);
        let mut daemon = daemon_for(&feed, None, port);

        daemon.run_cycle();
        assert!(enqueued_urls(&commands).is_empty());
        assert!(daemon.poller().last_enqueued().is_none());

        daemon.run_cycle();
        assert_eq!(enqueued_urls(&commands), vec![watch("song")]);
    }

    #[test]
    fn test_vlc_client_reconnects_without_intervention() {
        let (port, commands) = spawn_fake_vlc(&[0]);
        let mut vlc = VlcClient::new("127.0.0.1", port, Duration::from_secs(2));
        let video = VideoReference::from_video_id("again");

        match vlc.enqueue(&video) {
            Err(Error::PlayerUnreachable(_)) => {}
            other => panic!("expected PlayerUnreachable, got {other:?}"),
        }
        assert!(vlc.enqueue(&video).is_ok());
        assert_eq!(vlc.currently_playing().expect("status"), None);
        assert_eq!(enqueued_urls(&commands), vec![watch("again")]);
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn test_cli_help_displays_correctly() {
        let output = Command::new(env!("CARGO_BIN_EXE_mimi"))
            .arg("--help")
            .output()
            .expect("Failed to run help command");

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(output.status.success());
        assert!(stdout.contains("mimi"));
        assert!(stdout.contains("start"));
    }

    #[test]
    fn test_start_with_missing_config_fails() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let missing = temp_dir.path().join("absent.json");

        let output = Command::new(env!("CARGO_BIN_EXE_mimi"))
            .args(["start", "--config"])
            .arg(&missing)
            .output()
            .expect("Failed to run start command");

        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("absent.json"));
    }

    #[test]
    fn test_start_with_invalid_config_fails() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"port": 0, "lastfm_user": "u", "lastfm_key": "k"}"#).expect("write config");

        let output = Command::new(env!("CARGO_BIN_EXE_mimi"))
            .args(["start", "--config"])
            .arg(&path)
            .output()
            .expect("Failed to run start command");

        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("port"));
    }
}
