//! Per-element load state machine.
//!
//! A [`Listener`] tracks one bound element: its resolved resources, its
//! scroll target and where it is in the load lifecycle.
//!
//! # State Machine
//!
//! ```text
//!   Idle ──load──► AttemptingLoad ──ok──► Loaded
//!                    │     ▲
//!               fail │     │ load
//!                    ▼     │
//!            ErroredRetryable    (attempt_count < max_attempts)
//!                    │
//!                    ▼
//!            ErroredTerminal     (attempt_count == max_attempts)
//! ```
//!
//! The listener never schedules its own retries. A later scheduling pass that
//! finds it still eligible calls [`Listener::begin_load`] again.
//!
//! The listener itself is synchronous. [`Listener::begin_load`] tells the
//! manager what to do (nothing, render a cache hit, or spawn a fetch) and the
//! manager reports fetch outcomes back through [`Listener::complete_success`]
//! and [`Listener::complete_failure`].

mod descriptor;
mod filter;
mod srcset;

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use descriptor::{Descriptor, ResolvedSources};
pub use filter::{CdnSuffixFilter, SourceFilter, SourceFilters};
pub use srcset::{parse_srcset, select_from_srcset, SrcsetCandidate};

use crate::cache::ResourceCache;
use crate::geometry::Rect;
use crate::host::{NodeId, RenderState, Target};
use crate::report::PerformanceEntry;

/// Manager-assigned listener identity, unique for the manager's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Load lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    AttemptingLoad,
    Loaded,
    ErroredRetryable,
    ErroredTerminal,
}

impl LoadState {
    /// Whether a call to `load` may start a fetch from this state.
    pub fn can_load(&self) -> bool {
        matches!(self, LoadState::Idle | LoadState::ErroredRetryable)
    }

    /// The render state a host would currently show.
    pub fn render_state(&self) -> RenderState {
        match self {
            LoadState::Loaded => RenderState::Loaded,
            LoadState::ErroredRetryable | LoadState::ErroredTerminal => RenderState::Error,
            LoadState::Idle | LoadState::AttemptingLoad => RenderState::Loading,
        }
    }
}

/// Work the manager must perform for a fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub id: ListenerId,
    pub element: NodeId,
    pub generation: u64,
    pub source: String,
    pub placeholder: String,
}

/// Result of asking a listener to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadDecision {
    /// Nothing to do.
    Skip,
    /// The source was cached; the listener is now `Loaded`.
    CacheHit,
    /// The listener is now `AttemptingLoad`; run this job.
    Fetch(FetchJob),
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    bound_at: Instant,
    load_start: Option<Instant>,
    load_end: Option<Instant>,
}

/// Per-element record driving the load state machine.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    element: NodeId,
    target: Target,
    sources: ResolvedSources,
    bind_target: Option<String>,
    state: LoadState,
    attempt_count: u32,
    max_attempts: u32,
    rect: Option<Rect>,
    generation: u64,
    timing: Timing,
}

impl Listener {
    pub fn new(
        id: ListenerId,
        element: NodeId,
        target: Target,
        sources: ResolvedSources,
        bind_target: Option<String>,
        max_attempts: u32,
        now: Instant,
    ) -> Self {
        Self {
            id,
            element,
            target,
            sources,
            bind_target,
            state: LoadState::Idle,
            attempt_count: 0,
            max_attempts: max_attempts.max(1),
            rect: None,
            generation: 0,
            timing: Timing {
                bound_at: now,
                load_start: None,
                load_end: None,
            },
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> Option<&str> {
        self.sources.source.as_deref()
    }

    pub fn sources(&self) -> &ResolvedSources {
        &self.sources
    }

    /// Last bounding rectangle seen by a scheduling pass.
    pub fn rect(&self) -> Option<Rect> {
        self.rect
    }

    pub fn set_rect(&mut self, rect: Option<Rect>) {
        self.rect = rect;
    }

    /// Attempt to load.
    ///
    /// Skips when already loaded, terminal, in flight, or without a source.
    /// A cached source completes synchronously without a fetch.
    pub fn begin_load(&mut self, cache: &ResourceCache) -> LoadDecision {
        if !self.state.can_load() {
            if self.state == LoadState::ErroredTerminal {
                tracing::trace!(
                    listener = %self.id,
                    attempts = self.attempt_count,
                    "Attempt budget exhausted, not loading"
                );
            }
            return LoadDecision::Skip;
        }

        let Some(source) = self.sources.source.clone() else {
            return LoadDecision::Skip;
        };

        if cache.has(&source) {
            self.state = LoadState::Loaded;
            return LoadDecision::CacheHit;
        }

        self.state = LoadState::AttemptingLoad;
        LoadDecision::Fetch(FetchJob {
            id: self.id,
            element: self.element,
            generation: self.generation,
            source,
            placeholder: self.sources.placeholder.clone(),
        })
    }

    /// Whether a completion for `job` still applies to this listener.
    pub fn accepts(&self, job: &FetchJob) -> bool {
        self.id == job.id
            && self.generation == job.generation
            && self.state == LoadState::AttemptingLoad
    }

    /// Record the start of the primary fetch.
    pub fn record_load_start(&mut self, now: Instant) {
        self.timing.load_start = Some(now);
        self.timing.load_end = None;
    }

    /// The primary fetch succeeded.
    pub fn complete_success(&mut self, now: Instant) {
        self.timing.load_end = Some(now);
        self.state = LoadState::Loaded;
    }

    /// The primary fetch failed; consume one attempt.
    pub fn complete_failure(&mut self) -> LoadState {
        self.attempt_count = (self.attempt_count + 1).min(self.max_attempts);
        self.state = if self.attempt_count >= self.max_attempts {
            LoadState::ErroredTerminal
        } else {
            LoadState::ErroredRetryable
        };
        self.state
    }

    /// Replace the resolved resources.
    ///
    /// Returns `true` when the source changed, in which case the attempt
    /// counter and state are reset and in-flight fetches are orphaned.
    pub fn update(&mut self, sources: ResolvedSources, bind_target: Option<String>) -> bool {
        let changed = sources.source != self.sources.source;
        self.sources = sources;
        self.bind_target = bind_target;

        if changed {
            self.attempt_count = 0;
            self.state = LoadState::Idle;
            self.generation += 1;
            self.timing.load_start = None;
            self.timing.load_end = None;
        }
        changed
    }

    /// Change the attempt budget, keeping `attempt_count <= max_attempts`.
    ///
    /// A terminal listener stays terminal; only a changed source in
    /// [`Listener::update`] leaves that state.
    pub fn set_max_attempts(&mut self, max_attempts: u32) {
        self.max_attempts = max_attempts.max(1);
        if self.attempt_count >= self.max_attempts {
            self.attempt_count = self.max_attempts;
            if self.state == LoadState::ErroredRetryable {
                self.state = LoadState::ErroredTerminal;
            }
        }
    }

    /// Snapshot handed to renderers and bus subscribers.
    pub fn info(&self) -> ListenerInfo {
        ListenerInfo {
            id: self.id,
            element: self.element,
            source: self.sources.source.clone(),
            placeholder: self.sources.placeholder.clone(),
            error_resource: self.sources.error_resource.clone(),
            bind_target: self.bind_target.clone(),
            state: self.state,
            attempt_count: self.attempt_count,
            max_attempts: self.max_attempts,
            bound_for: None,
        }
    }

    /// Snapshot including how long the listener has been bound.
    pub fn info_at(&self, now: Instant) -> ListenerInfo {
        ListenerInfo {
            bound_for: Some(now.saturating_duration_since(self.timing.bound_at)),
            ..self.info()
        }
    }

    /// Load timing for the performance report.
    ///
    /// Elapsed time is zero until a fetched load completes.
    pub fn performance(&self) -> PerformanceEntry {
        let elapsed = match (self.state, self.timing.load_start, self.timing.load_end) {
            (LoadState::Loaded, Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        };
        PerformanceEntry {
            resource: self.sources.source.clone().unwrap_or_default(),
            state: self.state.render_state(),
            elapsed_seconds: elapsed.as_secs_f64(),
        }
    }
}

/// Read-only view of a listener at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerInfo {
    pub id: ListenerId,
    pub element: NodeId,
    pub source: Option<String>,
    pub placeholder: String,
    pub error_resource: String,
    pub bind_target: Option<String>,
    pub state: LoadState,
    pub attempt_count: u32,
    pub max_attempts: u32,
    #[serde(skip)]
    pub bound_for: Option<Duration>,
}

impl ListenerInfo {
    /// The resource a host should show in `state`.
    pub fn resource_for(&self, state: RenderState) -> &str {
        match state {
            RenderState::Loading => &self.placeholder,
            RenderState::Error => &self.error_resource,
            RenderState::Loaded => self.source.as_deref().unwrap_or_default(),
        }
    }

    /// The value to write onto the element.
    ///
    /// With a bind target this is a CSS `url("...")` for that style property,
    /// otherwise the bare resource for the source attribute.
    pub fn render_value(&self, state: RenderState) -> String {
        let resource = self.resource_for(state);
        match self.bind_target {
            Some(_) => format!("url(\"{}\")", resource),
            None => resource.to_string(),
        }
    }
}

/// Returned by `bind`; identifies the listener now tracking an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    pub id: ListenerId,
    pub element: NodeId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn listener(source: Option<&str>, max_attempts: u32) -> Listener {
        Listener::new(
            ListenerId(1),
            NodeId(1),
            Target::Window,
            ResolvedSources::new(source.map(str::to_string)),
            None,
            max_attempts,
            Instant::now(),
        )
    }

    fn expect_job(decision: LoadDecision) -> FetchJob {
        match decision {
            LoadDecision::Fetch(job) => job,
            other => panic!("expected fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_load_starts_fetch() {
        let cache = ResourceCache::default();
        let mut listener = listener(Some("a.png"), 3);

        let job = expect_job(listener.begin_load(&cache));

        assert_eq!(job.source, "a.png");
        assert_eq!(listener.state(), LoadState::AttemptingLoad);
    }

    #[test]
    fn test_load_while_in_flight_is_noop() {
        let cache = ResourceCache::default();
        let mut listener = listener(Some("a.png"), 3);
        listener.begin_load(&cache);

        assert_eq!(listener.begin_load(&cache), LoadDecision::Skip);
    }

    #[test]
    fn test_cache_hit_skips_fetch() {
        let mut cache = ResourceCache::default();
        cache.add("a.png");
        let mut listener = listener(Some("a.png"), 3);

        assert_eq!(listener.begin_load(&cache), LoadDecision::CacheHit);
        assert_eq!(listener.state(), LoadState::Loaded);
        assert_eq!(listener.begin_load(&cache), LoadDecision::Skip);
    }

    #[test]
    fn test_missing_source_stays_idle() {
        let cache = ResourceCache::default();
        let mut listener = listener(None, 3);

        assert_eq!(listener.begin_load(&cache), LoadDecision::Skip);
        assert_eq!(listener.state(), LoadState::Idle);
    }

    #[test]
    fn test_retry_sequence_then_success() {
        let cache = ResourceCache::default();
        let mut listener = listener(Some("a.png"), 3);
        let mut states = vec![listener.state()];

        for _ in 0..2 {
            expect_job(listener.begin_load(&cache));
            states.push(listener.state());
            states.push(listener.complete_failure());
        }
        expect_job(listener.begin_load(&cache));
        states.push(listener.state());
        listener.complete_success(Instant::now());
        states.push(listener.state());

        assert_eq!(
            states,
            vec![
                LoadState::Idle,
                LoadState::AttemptingLoad,
                LoadState::ErroredRetryable,
                LoadState::AttemptingLoad,
                LoadState::ErroredRetryable,
                LoadState::AttemptingLoad,
                LoadState::Loaded,
            ]
        );
    }

    #[test]
    fn test_terminal_after_budget() {
        let cache = ResourceCache::default();
        let mut listener = listener(Some("a.png"), 2);

        listener.begin_load(&cache);
        assert_eq!(listener.complete_failure(), LoadState::ErroredRetryable);
        listener.begin_load(&cache);
        assert_eq!(listener.complete_failure(), LoadState::ErroredTerminal);

        assert_eq!(listener.begin_load(&cache), LoadDecision::Skip);
        assert_eq!(listener.attempt_count(), 2);
    }

    #[test]
    fn test_update_unchanged_source_keeps_state() {
        let cache = ResourceCache::default();
        let mut listener = listener(Some("a.png"), 3);
        listener.begin_load(&cache);
        listener.complete_failure();

        let changed = listener.update(ResolvedSources::new(Some("a.png".to_string())), None);

        assert!(!changed);
        assert_eq!(listener.attempt_count(), 1);
        assert_eq!(listener.state(), LoadState::ErroredRetryable);
        assert_eq!(listener.generation(), 0);
    }

    #[test]
    fn test_update_changed_source_resets() {
        let cache = ResourceCache::default();
        let mut listener = listener(Some("a.png"), 3);
        let job = expect_job(listener.begin_load(&cache));

        let changed = listener.update(ResolvedSources::new(Some("b.png".to_string())), None);

        assert!(changed);
        assert_eq!(listener.attempt_count(), 0);
        assert_eq!(listener.state(), LoadState::Idle);
        assert!(!listener.accepts(&job), "old fetch is orphaned");
    }

    #[test]
    fn test_lowering_budget_makes_terminal() {
        let cache = ResourceCache::default();
        let mut listener = listener(Some("a.png"), 3);
        listener.begin_load(&cache);
        listener.complete_failure();
        listener.begin_load(&cache);
        listener.complete_failure();

        listener.set_max_attempts(2);
        assert_eq!(listener.state(), LoadState::ErroredTerminal);

        listener.set_max_attempts(5);
        assert_eq!(listener.state(), LoadState::ErroredTerminal);
        assert_eq!(listener.attempt_count(), 2);
        assert_eq!(listener.begin_load(&cache), LoadDecision::Skip);
    }

    #[test]
    fn test_changed_source_leaves_terminal_state() {
        let cache = ResourceCache::default();
        let mut listener = listener(Some("a.png"), 1);
        listener.begin_load(&cache);
        assert_eq!(listener.complete_failure(), LoadState::ErroredTerminal);

        listener.update(ResolvedSources::new(Some("b.png".to_string())), None);

        assert_eq!(listener.state(), LoadState::Idle);
        assert!(matches!(listener.begin_load(&cache), LoadDecision::Fetch(_)));
    }

    #[test]
    fn test_performance_reports_elapsed_only_when_loaded() {
        let cache = ResourceCache::default();
        let mut listener = listener(Some("a.png"), 3);
        let start = Instant::now();

        assert_eq!(listener.performance().elapsed_seconds, 0.0);
        assert_eq!(listener.performance().state, RenderState::Loading);

        listener.begin_load(&cache);
        listener.record_load_start(start);
        listener.complete_success(start + Duration::from_millis(1500));

        let entry = listener.performance();
        assert_eq!(entry.state, RenderState::Loaded);
        assert!((entry.elapsed_seconds - 1.5).abs() < 1e-9);
        assert_eq!(entry.resource, "a.png");
    }

    #[test]
    fn test_render_value_with_bind_target() {
        let mut info = listener(Some("a.png"), 3).info();
        assert_eq!(info.render_value(RenderState::Loaded), "a.png");

        info.bind_target = Some("background-image".to_string());
        assert_eq!(info.render_value(RenderState::Loaded), "url(\"a.png\")");
        assert_eq!(info.resource_for(RenderState::Error), crate::config::DEFAULT_RESOURCE);
    }

    proptest! {
        #[test]
        fn prop_attempt_count_never_exceeds_budget(
            max_attempts in 1u32..6,
            outcomes in proptest::collection::vec(any::<bool>(), 0..32),
            budget_changes in proptest::collection::vec(1u32..6, 0..4),
        ) {
            let cache = ResourceCache::default();
            let mut listener = listener(Some("a.png"), max_attempts);
            let mut changes = budget_changes.into_iter();

            for (i, succeed) in outcomes.into_iter().enumerate() {
                if i % 7 == 6 {
                    if let Some(budget) = changes.next() {
                        listener.set_max_attempts(budget);
                    }
                }
                let was_terminal = listener.state() == LoadState::ErroredTerminal;
                let decision = listener.begin_load(&cache);
                prop_assert!(!(was_terminal && matches!(decision, LoadDecision::Fetch(_))));
                if let LoadDecision::Fetch(_) = decision {
                    if succeed {
                        listener.complete_success(Instant::now());
                    } else {
                        listener.complete_failure();
                    }
                }
                prop_assert!(listener.attempt_count() <= listener.max_attempts());
            }
        }
    }
}
