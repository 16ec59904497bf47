//! Trailing-edge throttle with explicit timestamps.
//!
//! The throttle owns no timer. Callers pass `now` into [`Throttle::request`]
//! and, when told a call was deferred, arrange for [`Throttle::fire_due`] to
//! be invoked at the returned deadline. This keeps the policy deterministic
//! under a manual clock.
//!
//! # Policy
//!
//! - A request at least `interval` after the last run executes immediately.
//! - A request inside the interval schedules one trailing run at
//!   `last_run + interval`.
//! - Requests while a trailing run is pending are dropped.

use std::time::{Duration, Instant};

/// Outcome of a throttle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Run the action now.
    Run,
    /// A trailing run was scheduled for `at`.
    Deferred { at: Instant },
    /// A trailing run is already pending; this request was dropped.
    Coalesced,
}

/// Rate limiter for scheduling passes.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_run: Option<Instant>,
    pending: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
            pending: None,
        }
    }

    /// Ask to run the throttled action at `now`.
    pub fn request(&mut self, now: Instant) -> ThrottleDecision {
        if self.pending.is_some() {
            return ThrottleDecision::Coalesced;
        }

        match self.last_run {
            Some(last) if now.saturating_duration_since(last) < self.interval => {
                let at = last + self.interval;
                self.pending = Some(at);
                ThrottleDecision::Deferred { at }
            }
            _ => {
                self.last_run = Some(now);
                ThrottleDecision::Run
            }
        }
    }

    /// Consume the pending trailing run if its deadline has passed.
    ///
    /// Returns `true` when the caller should run the action now.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(at) if now >= at => {
                self.pending = None;
                self.last_run = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Deadline of the pending trailing run, if any.
    pub fn pending_deadline(&self) -> Option<Instant> {
        self.pending
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Change the interval. A pending run keeps its original deadline.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Forget run history and any pending run.
    pub fn reset(&mut self) {
        self.last_run = None;
        self.pending = None;
    }
}
