//! Poll interval selection.
//!
//! Two modes, switched on every poll with no smoothing: while the user is
//! listening we poll often so new tracks show up quickly, otherwise we back
//! off to go easy on the API.

use std::fmt;
use std::time::Duration;

/// Which interval the scheduler is currently using
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingMode {
    /// Last poll saw a now-playing track
    Active,
    /// Nobody is listening
    Idle,
}

impl fmt::Display for PollingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Idle => write!(f, "ASLEEP"),
        }
    }
}

/// What the scheduler remembers between polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerState {
    pub last_poll_was_active: bool,
    pub current_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct AdaptiveScheduler {
    active_delay: Duration,
    idle_delay: Duration,
    state: SchedulerState,
}

impl AdaptiveScheduler {
    /// Start in idle mode until the first poll says otherwise
    pub fn new(active_delay: Duration, idle_delay: Duration) -> Self {
        Self {
            active_delay,
            idle_delay,
            state: SchedulerState {
                last_poll_was_active: false,
                current_delay: idle_delay,
            },
        }
    }

    /// Delay before the next poll.
    ///
    /// Depends only on `was_active`; `_previous` is accepted so callers can
    /// thread the last delay through, but never changes the outcome.
    pub fn next_delay(&self, was_active: bool, _previous: Duration) -> Duration {
        if was_active {
            self.active_delay
        } else {
            self.idle_delay
        }
    }

    /// Fold a poll result into the state and return the new delay
    pub fn record(&mut self, was_active: bool) -> Duration {
        let delay = self.next_delay(was_active, self.state.current_delay);
        self.state = SchedulerState {
            last_poll_was_active: was_active,
            current_delay: delay,
        };
        delay
    }

    pub fn mode(&self) -> PollingMode {
        if self.state.last_poll_was_active {
            PollingMode::Active
        } else {
            PollingMode::Idle
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }
}
