//! Bounded waits: element polling and settle delays.
//!
//! Every wait in a run is a bounded suspension through
//! [`PageDriver::wait`], so a step can never block indefinitely and a mock
//! driver can run the whole pipeline without sleeping.

use crate::driver::{ElementHandle, PageDriver};
use crate::strategy::StrategyKind;
use serde::{Deserialize, Serialize};

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Delays applied between pipeline actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Wait after loading the base URL
    pub initial_load_ms: u64,
    /// Timeout for the locale anchor probe
    pub anchor_probe_ms: u64,
    /// Wait after a navigation or locale-selection click
    pub settle_ms: u64,
    /// Wait after clicking a menu opener
    pub menu_settle_ms: u64,
    /// Timeout per expected text lookup
    pub assert_timeout_ms: u64,
    /// Interval between element polls
    pub poll_interval_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            initial_load_ms: 2000,
            anchor_probe_ms: 1000,
            settle_ms: 1000,
            menu_settle_ms: 500,
            assert_timeout_ms: 2000,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Timing {
    /// Create timing with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// No settle delays and single-shot probes, for scripted pages
    #[must_use]
    pub const fn instant() -> Self {
        Self {
            initial_load_ms: 0,
            anchor_probe_ms: 0,
            settle_ms: 0,
            menu_settle_ms: 0,
            assert_timeout_ms: 0,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// Set the initial load delay
    #[must_use]
    pub const fn with_initial_load(mut self, ms: u64) -> Self {
        self.initial_load_ms = ms;
        self
    }

    /// Set the anchor probe timeout
    #[must_use]
    pub const fn with_anchor_probe(mut self, ms: u64) -> Self {
        self.anchor_probe_ms = ms;
        self
    }

    /// Set the settle delay
    #[must_use]
    pub const fn with_settle(mut self, ms: u64) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Set the menu settle delay
    #[must_use]
    pub const fn with_menu_settle(mut self, ms: u64) -> Self {
        self.menu_settle_ms = ms;
        self
    }

    /// Set the per-text assertion timeout
    #[must_use]
    pub const fn with_assert_timeout(mut self, ms: u64) -> Self {
        self.assert_timeout_ms = ms;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }
}

/// Shortest interval between polls; a zero interval is raised to this
pub const MIN_POLL_INTERVAL_MS: u64 = 1;

/// Bounded polling schedule for one lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Total timeout
    pub timeout_ms: u64,
    /// Interval between polls
    pub poll_interval_ms: u64,
}

impl PollSchedule {
    /// Create a schedule.
    ///
    /// The interval is at least [`MIN_POLL_INTERVAL_MS`] so the schedule
    /// always spans the whole timeout.
    #[must_use]
    pub const fn new(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        let poll_interval_ms = if poll_interval_ms < MIN_POLL_INTERVAL_MS {
            MIN_POLL_INTERVAL_MS
        } else {
            poll_interval_ms
        };
        Self {
            timeout_ms,
            poll_interval_ms,
        }
    }

    /// Number of polls; always at least one
    #[must_use]
    pub const fn attempts(&self) -> u64 {
        self.timeout_ms / self.poll_interval_ms + 1
    }
}

/// Outcome of polling for a visible element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// A visible match
    Visible(ElementHandle),
    /// Matches existed but none became visible
    Hidden,
    /// Nothing matched
    Absent,
    /// The driver failed on the last poll
    Failed(String),
}

impl Probe {
    /// Whether a visible element was found
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        matches!(self, Self::Visible(_))
    }
}

/// Poll until an element matching `kind` is visible or the schedule runs out
pub async fn poll_visible(
    page: &dyn PageDriver,
    kind: &StrategyKind,
    schedule: PollSchedule,
) -> Probe {
    let attempts = schedule.attempts();
    let mut last = Probe::Absent;
    for attempt in 0..attempts {
        last = match page.locate(kind).await {
            Ok(Some(element)) => match page.is_visible(&element).await {
                Ok(true) => return Probe::Visible(element),
                Ok(false) => Probe::Hidden,
                Err(e) => Probe::Failed(e.to_string()),
            },
            Ok(None) => Probe::Absent,
            Err(e) => Probe::Failed(e.to_string()),
        };
        if attempt + 1 < attempts {
            page.wait(schedule.poll_interval_ms).await;
        }
    }
    last
}
