//! Per-client sliding-window rate limiting.
//!
//! Every identity (a client IP, normally) gets two windows: the last minute
//! and the last hour. A request is admitted only if both are under their
//! caps, and only admitted requests are recorded.
//!
//! # Concurrency
//!
//! The controller holds a [`DashMap`] from identity to that identity's
//! timestamp queue behind its own [`Mutex`]. Checks for different identities
//! lock different queues; a check for one identity prunes, counts and records
//! under a single lock, so two simultaneous requests can never both slip in
//! under the last free slot.
//!
//! # Memory
//!
//! Timestamps older than an hour are pruned whenever their identity is
//! checked. Identities that stop sending requests are removed by
//! [`AdmissionController::sweep`], which the server runs periodically.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::AdmissionConfig;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

pub const MINUTE_LIMIT_MESSAGE: &str =
    "You're sending messages a little too fast. Please wait a moment and try again.";
pub const HOUR_LIMIT_MESSAGE: &str =
    "You've reached the message limit for this session. Please try again later, or contact the firm directly.";

/// Source of "now" for the limiter.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time via [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Which window turned a request away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MinuteLimit,
    HourLimit,
}

impl Rejection {
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::MinuteLimit => MINUTE_LIMIT_MESSAGE,
            Rejection::HourLimit => HOUR_LIMIT_MESSAGE,
        }
    }

    /// Seconds a client should wait before retrying.
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Rejection::MinuteLimit => MINUTE.as_secs(),
            Rejection::HourLimit => HOUR.as_secs(),
        }
    }
}

/// Outcome of [`AdmissionController::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected(Rejection),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    /// User-facing explanation; empty when allowed.
    pub fn message(&self) -> &'static str {
        match self {
            Admission::Allowed => "",
            Admission::Rejected(r) => r.message(),
        }
    }
}

type Window = Arc<Mutex<VecDeque<Instant>>>;

/// Sliding-window rate limiter keyed by client identity.
pub struct AdmissionController {
    windows: DashMap<String, Window>,
    per_minute: usize,
    per_hour: usize,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AdmissionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            per_minute: config.per_minute as usize,
            per_hour: config.per_hour as usize,
            clock,
        }
    }

    /// Admits or rejects one request from `identity`, recording it if admitted.
    ///
    /// The minute window is consulted before the hour window, so a client at
    /// both caps is told about the minute limit, and a client only at the hour
    /// cap is told about the hour limit.
    pub fn check(&self, identity: &str) -> Admission {
        let window = self.window_for(identity);
        let mut stamps = window.lock().unwrap_or_else(|p| p.into_inner());
        let now = self.clock.now();

        while let Some(oldest) = stamps.front() {
            if now.duration_since(*oldest) >= HOUR {
                stamps.pop_front();
            } else {
                break;
            }
        }

        let last_minute = stamps
            .iter()
            .rev()
            .take_while(|ts| now.duration_since(**ts) < MINUTE)
            .count();
        if last_minute >= self.per_minute {
            return Admission::Rejected(Rejection::MinuteLimit);
        }

        if stamps.len() >= self.per_hour {
            return Admission::Rejected(Rejection::HourLimit);
        }

        stamps.push_back(now);
        Admission::Allowed
    }

    /// Drops identities with no admitted request in the last hour and returns
    /// how many were removed.
    ///
    /// A window still held by an in-flight [`check`](Self::check) is kept:
    /// the map owns one reference, so any count above one means a caller
    /// cloned it under the shard lock and is about to record into it.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            if Arc::strong_count(window) > 1 {
                return true;
            }
            let stamps = window.lock().unwrap_or_else(|p| p.into_inner());
            stamps
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < HOUR)
        });
        before.saturating_sub(self.windows.len())
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    fn window_for(&self, identity: &str) -> Window {
        if let Some(existing) = self.windows.get(identity) {
            return existing.value().clone();
        }
        self.windows
            .entry(identity.to_string())
            .or_default()
            .value()
            .clone()
    }
}
