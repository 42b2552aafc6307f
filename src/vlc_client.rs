//! # VLC Client Module
//!
//! Talks to VLC through its `rc` remote-control interface, a line based text
//! protocol over TCP. Start VLC with:
//!
//! ```bash
//! vlc --extraintf rc --rc-host 127.0.0.1:4212
//! ```
//!
//! ## Protocol
//!
//! On connect VLC prints a banner followed by the prompt marker `"> "`. Each
//! command is a single line; VLC answers with zero or more lines of text and
//! then prints the prompt again. Status lines are wrapped in parentheses:
//!
//! ```text
//! status
//! ( new input: https://www.youtube.com/watch?v=dQw4w9WgXcQ )
//! ( audio volume: 256 )
//! ( state playing )
//! >
//! ```
//!
//! ## Connection Handling
//!
//! The connection is opened lazily on first use and kept open between calls.
//! Any failure drops it, and the next call simply reconnects, so a player that
//! is restarting never needs manual recovery. Every socket operation is
//! bounded by the configured timeout.

use crate::error::{Error, Result};
use crate::track::VideoReference;
use log::{debug, info, warn};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Marker VLC prints when it is ready for the next command
const PROMPT: &[u8] = b"> ";

/// Longest response we are willing to buffer
const MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// Media player control surface used by the poller
pub trait Player {
    /// Append a video to the playlist
    fn enqueue(&mut self, video: &VideoReference) -> Result<Ack>;

    /// What the player is doing right now, `None` when idle
    fn currently_playing(&mut self) -> Result<Option<PlayerStatus>>;
}

/// Acknowledgement of an accepted command, with any text VLC printed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    pub lines: Vec<String>,
}

/// Playback state reported by `status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// Parsed `status` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStatus {
    /// Current input (URL or file), if any
    pub input: Option<String>,
    pub state: PlaybackState,
}

/// Stateful client for VLC's rc interface
#[derive(Debug)]
pub struct VlcClient {
    host: String,
    port: u16,
    timeout: Duration,
    connection: Option<TcpStream>,
}

impl VlcClient {
    /// Create a client; nothing is opened until the first command
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.to_string(),
            port,
            timeout,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Send one command line and return the response lines.
    ///
    /// Drops the connection on any failure so the next call reconnects.
    fn command(&mut self, line: &str) -> Result<Vec<String>> {
        let result = self.try_command(line);
        if let Err(e) = &result {
            debug!("Dropping VLC connection after error: {e}");
            self.connection = None;
        }
        result
    }

    fn try_command(&mut self, line: &str) -> Result<Vec<String>> {
        if self.connection.is_none() {
            self.connection = Some(self.connect()?);
        }
        let stream = self
            .connection
            .as_mut()
            .ok_or_else(|| Error::PlayerUnreachable("no connection".to_string()))?;

        debug!("VLC <- {line}");
        stream
            .write_all(format!("{line}\n").as_bytes())
            .and_then(|()| stream.flush())
            .map_err(|e| Error::PlayerUnreachable(format!("write failed: {e}")))?;

        let response = read_until_prompt(stream)?;
        let lines = response_lines(&response);
        if let Some(bad) = lines.iter().find(|line| is_error_line(line)) {
            let verb = line.split_whitespace().next().unwrap_or(line);
            warn!("VLC rejected {verb}: {bad}");
            return Err(Error::Protocol(format!("{verb} rejected: {bad}")));
        }
        Ok(lines)
    }

    fn connect(&self) -> Result<TcpStream> {
        let endpoint = format!("{}:{}", self.host, self.port);
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| Error::PlayerUnreachable(format!("cannot resolve {endpoint}: {e}")))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(mut stream) => {
                    configure(&stream, self.timeout)
                        .map_err(|e| Error::PlayerUnreachable(format!("socket setup failed: {e}")))?;
                    // Swallow the banner so responses line up with commands
                    read_until_prompt(&mut stream)?;
                    info!("Connected to VLC at {endpoint}");
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no addresses".to_string());
        Err(Error::PlayerUnreachable(format!("cannot connect to {endpoint}: {reason}")))
    }
}

impl Player for VlcClient {
    fn enqueue(&mut self, video: &VideoReference) -> Result<Ack> {
        if video.source_url.contains(['\n', '\r']) {
            return Err(Error::Protocol(format!(
                "refusing to send URL with line breaks: {:?}",
                video.source_url
            )));
        }

        let lines = self.command(&format!("enqueue {}", video.source_url))?;
        Ok(Ack { lines })
    }

    fn currently_playing(&mut self) -> Result<Option<PlayerStatus>> {
        let lines = self.command("status")?;
        parse_status(&lines)
    }
}

fn configure(stream: &TcpStream, timeout: Duration) -> io::Result<()> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)
}

/// Read until the buffer ends with the prompt marker
fn read_until_prompt(stream: &mut impl Read) -> Result<String> {
    let mut response = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => return Err(Error::PlayerUnreachable("connection closed by player".to_string())),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Err(Error::Protocol("no prompt before timeout".to_string()));
            }
            Err(e) => return Err(Error::PlayerUnreachable(format!("read failed: {e}"))),
        };

        response.extend_from_slice(&chunk[..n]);
        if response.ends_with(PROMPT) {
            break;
        }
        if response.len() > MAX_RESPONSE_BYTES {
            return Err(Error::Protocol("response too long".to_string()));
        }
    }

    response.truncate(response.len() - PROMPT.len());
    Ok(String::from_utf8_lossy(&response).into_owned())
}

/// Non-empty response lines with any stray prompts removed
fn response_lines(response: &str) -> Vec<String> {
    response
        .lines()
        .map(|line| line.trim_start_matches("> ").trim())
        .filter(|line| !line.is_empty() && *line != ">")
        .map(str::to_string)
        .collect()
}

fn is_error_line(line: &str) -> bool {
    let lowered = line.to_ascii_lowercase();
    lowered.starts_with("unknown command") || lowered.starts_with("error")
}

/// Parse the lines of a `status` response.
///
/// # Errors
///
/// Returns [`Error::Protocol`] when there is no `state` token or it is not
/// one VLC is known to print.
pub fn parse_status(lines: &[String]) -> Result<Option<PlayerStatus>> {
    let mut input = None;
    let mut state = None;

    for line in lines {
        let Some(inner) = line
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .map(str::trim)
        else {
            continue;
        };

        if let Some(value) = inner.strip_prefix("new input:") {
            let value = value.trim();
            if !value.is_empty() {
                input = Some(value.to_string());
            }
        } else if let Some(value) = inner.strip_prefix("state ") {
            state = Some(match value.trim() {
                "playing" | "opening" | "buffering" => PlaybackState::Playing,
                "paused" => PlaybackState::Paused,
                "stopped" | "ended" => PlaybackState::Stopped,
                other => return Err(Error::Protocol(format!("unknown player state '{other}'"))),
            });
        }
    }

    let state = state.ok_or_else(|| Error::Protocol("status response has no state".to_string()))?;
    if state == PlaybackState::Stopped && input.is_none() {
        return Ok(None);
    }
    Ok(Some(PlayerStatus { input, state }))
}
