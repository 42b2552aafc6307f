//! # Last.fm Scrobbling Source
//!
//! Reads a user's recent tracks through the audioscrobbler 2.0 JSON API and
//! looks up the YouTube video Last.fm associates with a track.
//!
//! ## Recent Tracks
//!
//! `user.getrecenttracks` returns the feed newest first. A track that is
//! playing right now carries `@attr.nowplaying = "true"` and no `date`; every
//! other entry has `date.uts` (UNIX seconds, as a string). When the feed holds
//! exactly one entry, `recenttracks.track` is an object instead of an array.
//!
//! ## Associated Videos
//!
//! The API itself never exposes videos. The track page on last.fm embeds the
//! player link as `data-youtube-url` attributes; the last one on the page is
//! the track's own video (earlier ones belong to sidebars).

use crate::error::{Error, Result};
use crate::http;
use crate::track::{PlayedAt, Track, VideoReference};
use log::{debug, warn};
use scraper::{Html, Selector};
use serde_json::Value;

const API_BASE: &str = "http://ws.audioscrobbler.com/2.0/";
const WEB_BASE: &str = "https://www.last.fm/music";

lazy_static::lazy_static! {
    static ref YOUTUBE_ATTR: Selector =
        Selector::parse("[data-youtube-url]").expect("valid selector");
}

/// Source of listening activity.
///
/// `recent_tracks` failures are reported as [`Error::SourceUnavailable`],
/// `track_video` failures as [`Error::Resolution`].
pub trait ScrobbleSource {
    /// Up to `limit` recent tracks, newest first
    fn recent_tracks(&self, limit: u32) -> Result<Vec<Track>>;

    /// Video id already associated with a track, if any
    fn track_video(&self, artist: &str, title: &str) -> Result<Option<String>>;
}

/// Blocking Last.fm client for one user
pub struct LastFmClient {
    agent: ureq::Agent,
    user: String,
    api_key: String,
    retries: u32,
}

impl LastFmClient {
    pub fn new(agent: ureq::Agent, user: &str, api_key: &str, retries: u32) -> Self {
        Self {
            agent,
            user: user.to_string(),
            api_key: api_key.to_string(),
            retries,
        }
    }

    /// URL of the track page on last.fm
    pub fn track_page_url(artist: &str, title: &str) -> String {
        format!(
            "{WEB_BASE}/{}/_/{}",
            urlencoding::encode(artist),
            urlencoding::encode(title)
        )
    }
}

impl ScrobbleSource for LastFmClient {
    fn recent_tracks(&self, limit: u32) -> Result<Vec<Track>> {
        let limit = limit.to_string();
        let params = [
            ("method", "user.getrecenttracks"),
            ("user", self.user.as_str()),
            ("api_key", self.api_key.as_str()),
            ("format", "json"),
            ("limit", limit.as_str()),
        ];

        let response = http::get_with_retry(&self.agent, "recenttracks", API_BASE, &params, self.retries)
            .map_err(|e| Error::SourceUnavailable(e.to_string()))?;
        let body: Value = response
            .into_json()
            .map_err(|e| Error::SourceUnavailable(format!("invalid recenttracks body: {e}")))?;

        parse_recent_tracks(&body)
    }

    fn track_video(&self, artist: &str, title: &str) -> Result<Option<String>> {
        let url = Self::track_page_url(artist, title);
        debug!("Looking up associated video on {url}");

        let response = match http::get_with_retry(&self.agent, "track page", &url, &[], self.retries) {
            Ok(response) => response,
            // Unknown track pages are simply tracks without a video
            Err(failure) if failure.is_not_found() => return Ok(None),
            Err(failure) => return Err(Error::resolution(artist, title, failure.to_string())),
        };

        let html = response
            .into_string()
            .map_err(|e| Error::resolution(artist, title, format!("unreadable track page: {e}")))?;

        Ok(extract_video_id(&html))
    }
}

/// Parse a `user.getrecenttracks` JSON body into tracks, newest first.
///
/// # Errors
///
/// Returns [`Error::SourceUnavailable`] when the body is an API error
/// (`{"error": 6, "message": "User not found"}`) or lacks `recenttracks`.
pub fn parse_recent_tracks(body: &Value) -> Result<Vec<Track>> {
    if let Some(code) = body.get("error") {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(Error::SourceUnavailable(format!("Last.fm error {code}: {message}")));
    }

    let feed = body
        .get("recenttracks")
        .ok_or_else(|| Error::SourceUnavailable("response has no recenttracks".to_string()))?;

    let entries: Vec<&Value> = match feed.get("track") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    };

    Ok(entries.into_iter().filter_map(parse_track).collect())
}

fn parse_track(entry: &Value) -> Option<Track> {
    let title = entry.get("name").and_then(Value::as_str)?.to_string();

    // Plain feeds use {"#text": ...}, extended feeds use {"name": ...}
    let artist = entry.get("artist").and_then(|artist| {
        artist
            .get("#text")
            .or_else(|| artist.get("name"))
            .and_then(Value::as_str)
    })?;

    let now_playing = entry
        .get("@attr")
        .and_then(|attr| attr.get("nowplaying"))
        .and_then(Value::as_str)
        == Some("true");

    let played_at = if now_playing {
        PlayedAt::NowPlaying
    } else {
        let uts = entry
            .get("date")
            .and_then(|date| date.get("uts"))
            .and_then(Value::as_str)
            .and_then(|uts| uts.parse::<i64>().ok());
        match uts {
            Some(uts) => PlayedAt::Scrobbled(uts),
            None => {
                warn!("Dropping feed entry without date: {artist} - {title}");
                return None;
            }
        }
    };

    Some(Track {
        artist: artist.to_string(),
        title,
        played_at,
        associated_video_id: None,
    })
}

/// Video id of the last `data-youtube-url` attribute in a track page.
///
/// Attribute values come back with HTML entities decoded.
pub fn extract_video_id(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&YOUTUBE_ATTR)
        .filter_map(|element| element.value().attr("data-youtube-url"))
        .filter_map(VideoReference::from_url)
        .last()
        .map(|video| video.video_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_recent_tracks_newest_first() -> Result<()> {
        let body = json!({
            "recenttracks": {
                "track": [
                    {
                        "artist": {"#text": "Burial", "mbid": ""},
                        "name": "Archangel",
                        "@attr": {"nowplaying": "true"}
                    },
                    {
                        "artist": {"#text": "Burial", "mbid": ""},
                        "name": "Near Dark",
                        "date": {"uts": "1700000300", "#text": "14 Nov 2023, 22:18"}
                    },
                    {
                        "artist": {"#text": "Four Tet", "mbid": ""},
                        "name": "Two Thousand and Seventeen",
                        "date": {"uts": "1700000000", "#text": "14 Nov 2023, 22:13"}
                    }
                ],
                "@attr": {"user": "someone", "total": "3"}
            }
        });

        let tracks = parse_recent_tracks(&body)?;
        assert_eq!(tracks.len(), 3);
        assert!(tracks[0].is_now_playing());
        assert_eq!(tracks[0].title, "Archangel");
        assert_eq!(tracks[1].played_at, PlayedAt::Scrobbled(1_700_000_300));
        assert_eq!(tracks[2].artist, "Four Tet");
        Ok(())
    }

    #[test]
    fn test_parse_single_object_feed() -> Result<()> {
        let body = json!({
            "recenttracks": {
                "track": {
                    "artist": {"#text": "Aphex Twin"},
                    "name": "Xtal",
                    "date": {"uts": "1600000000"}
                }
            }
        });

        let tracks = parse_recent_tracks(&body)?;
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "Xtal");
        Ok(())
    }

    #[test]
    fn test_parse_extended_artist_and_empty_feed() -> Result<()> {
        let extended = json!({
            "recenttracks": {
                "track": [{"artist": {"name": "Moderat"}, "name": "Bad Kingdom", "date": {"uts": "5"}}]
            }
        });
        assert_eq!(parse_recent_tracks(&extended)?[0].artist, "Moderat");

        let empty = json!({"recenttracks": {"track": [], "@attr": {"total": "0"}}});
        assert!(parse_recent_tracks(&empty)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_parse_drops_entries_without_date() -> Result<()> {
        let body = json!({
            "recenttracks": {
                "track": [
                    {"artist": {"#text": "A"}, "name": "dated", "date": {"uts": "10"}},
                    {"artist": {"#text": "B"}, "name": "undated"}
                ]
            }
        });

        let tracks = parse_recent_tracks(&body)?;
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "dated");
        Ok(())
    }

    #[test]
    fn test_parse_api_error_is_source_unavailable() {
        let body = json!({"error": 6, "message": "User not found", "links": []});

        match parse_recent_tracks(&body) {
            Err(Error::SourceUnavailable(msg)) => assert!(msg.contains("User not found")),
            other => panic!("expected SourceUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_takes_last_youtube_attribute() {
        let html = r#"
            <div class="sidebar" data-youtube-url="https://www.youtube.com/watch?v=sidebar01"></div>
            <a class="play-this-track" data-youtube-url="https://www.youtube.com/watch?v=track0001&amp;t=1"
               data-playlink-affiliate="youtube">Play</a>
        "#;

        assert_eq!(extract_video_id(html).as_deref(), Some("track0001"));
    }

    #[test]
    fn test_extract_decodes_entities_in_attribute() {
        let html = r#"<a data-youtube-url="https://www.youtube.com/watch?feature=share&amp;v=realid01">Play</a>"#;
        assert_eq!(extract_video_id(html).as_deref(), Some("realid01"));
    }

    #[test]
    fn test_extract_ignores_attribute_text_outside_tags() {
        let html = r#"<p>data-youtube-url="https://www.youtube.com/watch?v=inprose1"</p>"#;
        assert_eq!(extract_video_id(html), None);
    }

    #[test]
    fn test_extract_without_attribute() {
        assert_eq!(extract_video_id("<html><body>no video</body></html>"), None);
    }

    #[test]
    fn test_track_page_url_encodes_names() {
        let url = LastFmClient::track_page_url("Sigur Rós", "Hoppípolla / live");
        assert!(url.starts_with("https://www.last.fm/music/Sigur%20R"));
        assert!(url.contains("/_/"));
        assert!(!url.contains(' '));
        assert!(url.ends_with("%20%2F%20live"));
    }
}
