//! Scheduling passes, throttled signals and intersection callbacks.

use std::sync::atomic::Ordering;
use std::time::Instant;

use super::{Manager, ManagerState, Notice};
use crate::host::{IntersectionEntry, NodeId, RenderState, Target};
use crate::listener::{FetchJob, ListenerId, LoadDecision, LoadState};
use crate::visibility::{Mode, ThrottleDecision};

impl Manager {
    /// Request a scheduling pass through the throttle.
    ///
    /// Runs immediately when the last pass is at least one poll interval
    /// old; otherwise one trailing pass is scheduled at interval expiry and
    /// further requests until then are dropped.
    pub fn schedule_check(&self) {
        let now = self.shared.clock.now();
        let decision = {
            let mut state = self.shared.state.lock();
            let decision = state.throttle.request(now);
            if !state.timer_armed {
                if let Some(at) = state.throttle.pending_deadline() {
                    state.timer_armed = true;
                    drop(state);
                    self.arm_timer(at);
                }
            }
            decision
        };

        match decision {
            ThrottleDecision::Run => self.run_pass(),
            ThrottleDecision::Deferred { at } => {
                tracing::trace!(
                    delay_ms = at.saturating_duration_since(now).as_millis() as u64,
                    "Pass deferred"
                );
            }
            ThrottleDecision::Coalesced => {}
        }
    }

    /// Run a scheduling pass now, bypassing the throttle.
    pub fn force_schedule_check(&self) {
        self.run_pass();
    }

    /// Host event handler for polling mode.
    pub fn on_signal(&self, target: Target, event: &str) {
        tracing::trace!(scroll_target = %target, event = %event, "Signal");
        self.schedule_check();
    }

    /// Run the trailing throttled pass if it is due.
    ///
    /// The manager's own timer calls this; hosts driving a manual clock call
    /// it after advancing time. Returns whether a pass ran.
    pub fn flush_throttled(&self) -> bool {
        let now = self.shared.clock.now();
        let due = self.shared.state.lock().throttle.fire_due(now);
        if due {
            self.run_pass();
        }
        due
    }

    /// Native intersection observer callback.
    ///
    /// Intersecting elements load; those already loaded stop being observed.
    /// Ignored unless the observer backend is active.
    pub fn on_intersection(&self, entries: &[IntersectionEntry]) {
        let host = self.shared.host.as_ref();
        let mut notices = Vec::new();
        let mut jobs = Vec::new();

        {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            if state.backend.mode() != Mode::Observer {
                tracing::trace!(entries = entries.len(), "Ignoring intersections outside observer mode");
                return;
            }

            for entry in entries.iter().filter(|e| e.is_intersecting) {
                let Some(idx) = state.position(entry.target) else {
                    continue;
                };
                if state.listeners[idx].state() == LoadState::Loaded {
                    state.backend.unwatch(host, entry.target);
                    continue;
                }
                load_at(state, idx, &mut notices, &mut jobs);
            }
        }

        self.deliver(notices);
        self.spawn_fetches(jobs);
    }

    /// Run one pass, or mark a follow-up if a pass is already running.
    fn run_pass(&self) {
        let shared = &self.shared;
        loop {
            if shared.scanning.swap(true, Ordering::AcqRel) {
                shared.rescan.store(true, Ordering::Release);
                return;
            }

            loop {
                shared.rescan.store(false, Ordering::Release);
                self.scan_once();
                if !shared.rescan.swap(false, Ordering::AcqRel) {
                    break;
                }
                tracing::trace!("Running coalesced follow-up pass");
            }

            shared.scanning.store(false, Ordering::Release);
            if !shared.rescan.load(Ordering::Acquire) {
                return;
            }
        }
    }

    /// One pass over a snapshot of the listener ids.
    ///
    /// Detached elements are collected first and removed after evaluation so
    /// the live sequence is never mutated mid-iteration.
    fn scan_once(&self) {
        let host = self.shared.host.as_ref();
        let mut notices = Vec::new();
        let mut jobs = Vec::new();

        {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            state.passes += 1;

            let viewport = host.viewport();
            let snapshot: Vec<(ListenerId, NodeId)> = state
                .listeners
                .iter()
                .map(|l| (l.id(), l.element()))
                .collect();

            let stale: Vec<ListenerId> = snapshot
                .iter()
                .filter(|(_, element)| !host.is_attached(*element))
                .map(|(id, _)| *id)
                .collect();

            for (id, element) in &snapshot {
                if stale.contains(id) {
                    continue;
                }
                let Some(idx) = state.position_of(*id) else {
                    continue;
                };
                let rect = host.bounding_rect(*element);
                state.listeners[idx].set_rect(rect);

                let eligible = rect.is_some_and(|r| state.backend.is_eligible(&r, &viewport));
                if eligible {
                    load_at(state, idx, &mut notices, &mut jobs);
                }
            }

            for id in &stale {
                if let Some(idx) = state.position_of(*id) {
                    let listener = state.remove_at(idx, host);
                    tracing::debug!(
                        listener = %listener.id(),
                        element = %listener.element(),
                        "Pruned detached element"
                    );
                }
            }

            tracing::trace!(
                listeners = snapshot.len(),
                pruned = stale.len(),
                fetches = jobs.len(),
                "Scheduling pass"
            );
        }

        self.deliver(notices);
        self.spawn_fetches(jobs);
    }

    /// Sleep until `at`, then flush the throttle.
    fn arm_timer(&self, at: Instant) {
        let delay = at.saturating_duration_since(self.shared.clock.now());
        let manager = self.clone();
        self.shared.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            manager.flush_throttled();
            manager.rearm_timer();
        });
    }

    /// Disarm the timer, or arm it again while a trailing run is still
    /// pending (its deadline had not passed on the manager's clock).
    fn rearm_timer(&self) {
        let next = {
            let mut state = self.shared.state.lock();
            let next = state.throttle.pending_deadline();
            state.timer_armed = next.is_some();
            next
        };
        if let Some(at) = next {
            tracing::trace!("Trailing pass not yet due, re-arming timer");
            self.arm_timer(at);
        }
    }
}

/// Ask the listener at `idx` to load, collecting the resulting work.
fn load_at(state: &mut ManagerState, idx: usize, notices: &mut Vec<Notice>, jobs: &mut Vec<FetchJob>) {
    match state.listeners[idx].begin_load(&state.cache) {
        LoadDecision::Skip => {}
        LoadDecision::CacheHit => {
            state.cache_hits += 1;
            let notice = state.notice(&state.listeners[idx], RenderState::Loaded, true);
            tracing::debug!(listener = %notice.info.id, source = ?notice.info.source, "Loaded from cache");
            notices.push(notice);
        }
        LoadDecision::Fetch(job) => jobs.push(job),
    }
}
