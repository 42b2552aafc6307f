//! YouTube Data API v3 search, used when Last.fm has no video for a track.

use crate::http;
use log::debug;
use serde::Deserialize;

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

/// YouTube usually has the right video in its top five results, if at all
const MAX_RESULTS: &str = "5";

/// Ranked video search
pub trait VideoSearch {
    /// Video ids matching `query`, in the service's own ranking
    fn search(&self, query: &str) -> Result<Vec<String>, String>;
}

/// Blocking client for the `search.list` endpoint
pub struct YouTubeSearch {
    agent: ureq::Agent,
    api_key: String,
    retries: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ItemId,
}

/// Channels and playlists come back without a `videoId`
#[derive(Debug, Deserialize)]
struct ItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

impl YouTubeSearch {
    pub fn new(agent: ureq::Agent, api_key: &str, retries: u32) -> Self {
        Self {
            agent,
            api_key: api_key.to_string(),
            retries,
        }
    }
}

impl VideoSearch for YouTubeSearch {
    fn search(&self, query: &str) -> Result<Vec<String>, String> {
        debug!("Searching YouTube for '{query}'");
        let params = [
            ("part", "snippet"),
            ("type", "video"),
            ("maxResults", MAX_RESULTS),
            ("q", query),
            ("key", self.api_key.as_str()),
        ];

        let response = http::get_with_retry(&self.agent, "youtube search", SEARCH_URL, &params, self.retries)
            .map_err(|e| e.to_string())?;
        let body = response
            .into_string()
            .map_err(|e| format!("unreadable youtube search body: {e}"))?;

        parse_search_response(&body)
    }
}

/// Video ids of a `search.list` response, in order, skipping non-video items
pub fn parse_search_response(body: &str) -> Result<Vec<String>, String> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| format!("invalid youtube search body: {e}"))?;

    Ok(response
        .items
        .into_iter()
        .filter_map(|item| item.id.video_id)
        .collect())
}
