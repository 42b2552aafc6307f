//! Shared blocking HTTP plumbing for the Last.fm and YouTube clients.
//!
//! Every request goes through one `ureq::Agent` with bounded connect/read
//! timeouts, so a stalled network call cannot wedge the polling loop. Transient
//! failures (timeouts, 429, 5xx) are retried a few times with a short
//! exponential backoff; anything else fails immediately.

use log::debug;
use std::time::Duration;

/// Upper bound for a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Base delay doubled on every retry
const BASE_BACKOFF: Duration = Duration::from_millis(250);

/// How an HTTP failure should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Worth another attempt
    Transient,
    /// Retrying will not help
    Hard,
}

/// A request that failed for good
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{label} request failed: {reason}")]
pub struct HttpFailure {
    pub label: String,
    pub kind: FailureKind,
    /// Status code when the server answered
    pub status: Option<u16>,
    /// Error text without the request URL
    pub reason: String,
}

impl HttpFailure {
    fn from_ureq(label: &str, error: &ureq::Error) -> Self {
        let status = match error {
            ureq::Error::Status(code, _) => Some(*code),
            ureq::Error::Transport(_) => None,
        };
        Self {
            label: label.to_string(),
            kind: classify(error),
            status,
            reason: describe(error),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

/// Build the agent used for every outbound call
pub fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(concat!("mimi/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Classify a `ureq` failure
pub fn classify(error: &ureq::Error) -> FailureKind {
    match error {
        ureq::Error::Status(code, _) => match code {
            408 | 429 | 500 | 502 | 503 | 504 => FailureKind::Transient,
            _ => FailureKind::Hard,
        },
        ureq::Error::Transport(transport) => {
            let lowered = transport.to_string().to_ascii_lowercase();
            if lowered.contains("timed out")
                || lowered.contains("timeout")
                || lowered.contains("connection reset")
            {
                FailureKind::Transient
            } else {
                FailureKind::Hard
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based)
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(6);
    BASE_BACKOFF
        .checked_mul(1u32 << exponent)
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF)
}

/// GET `url` with `params`, retrying transient failures up to `retries` times.
///
/// `label` names the call in logs and errors; query parameters are never
/// logged since they carry API keys.
///
/// # Errors
///
/// Returns an [`HttpFailure`] when the last attempt fails or the failure is
/// not transient.
pub fn get_with_retry(
    agent: &ureq::Agent,
    label: &str,
    url: &str,
    params: &[(&str, &str)],
    retries: u32,
) -> Result<ureq::Response, HttpFailure> {
    let mut attempt = 0u32;
    loop {
        let request = params
            .iter()
            .fold(agent.get(url), |request, (key, value)| request.query(key, value));

        match request.call() {
            Ok(response) => return Ok(response),
            Err(error) => {
                let kind = classify(&error);
                if kind == FailureKind::Transient && attempt < retries {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    debug!(
                        "{label} failed ({error}), retry {attempt}/{retries} in {}ms",
                        delay.as_millis()
                    );
                    std::thread::sleep(delay);
                    continue;
                }
                return Err(HttpFailure::from_ureq(label, &error));
            }
        }
    }
}

/// Error text without the request URL (which carries the API key)
fn describe(error: &ureq::Error) -> String {
    match error {
        ureq::Error::Status(code, response) => {
            format!("HTTP {code} {}", response.status_text())
        }
        ureq::Error::Transport(transport) => {
            let kind = transport.kind();
            match transport.message() {
                Some(message) => format!("{kind}: {message}"),
                None => kind.to_string(),
            }
        }
    }
}
