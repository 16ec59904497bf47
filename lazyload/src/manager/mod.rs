//! The lazy loading manager.
//!
//! [`Manager`] owns every listener, the scroll target registry, the active
//! visibility backend, the resource cache, the throttle and the event bus. It
//! is a cheap `Clone` handle: bindings, host event handlers and fetch tasks
//! all share one instance.
//!
//! # Design
//!
//! Mutable state sits behind a single `parking_lot::Mutex`. Work that calls
//! out of the engine (renderer, bus subscribers, platform event dispatch,
//! fetches) is collected while locked and performed after the lock is
//! released, so callbacks may re-enter the manager freely.
//!
//! Fetches run as Tokio tasks on the runtime captured by the builder. A
//! completion is applied only if its listener still exists with the same
//! generation, which makes unbinding or changing the source mid-fetch safe
//! without cancellation.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lazyload::geometry::{Rect, Viewport};
//! use lazyload::listener::Descriptor;
//! use lazyload::manager::Manager;
//! use lazyload::sim::{RecordingRenderer, ScriptedFetcher, SimHost};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), lazyload::LazyError> {
//! let host = Arc::new(SimHost::new(Viewport::new(800.0, 600.0)));
//! let body = host.add_root("body");
//! let img = host.add_node("img", Some(body), Rect::from_origin(0.0, 100.0, 200.0, 150.0));
//! let renderer = Arc::new(RecordingRenderer::new());
//!
//! let manager = Manager::builder(host.clone(), renderer.clone(), Arc::new(ScriptedFetcher::new()))
//!     .build()?;
//! manager.bind(img, Descriptor::new("https://cdn.example.com/a.png"));
//! manager.settle().await;
//!
//! assert!(manager.is_cached("https://cdn.example.com/a.png"));
//! # Ok(())
//! # }
//! ```

mod load;
mod scan;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::adapter::{Adapter, Adapters};
use crate::bus::{EventBus, SubscriptionId};
use crate::cache::ResourceCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigUpdate, LazyConfig};
use crate::error::LazyError;
use crate::fetch::Fetcher;
use crate::host::{Host, NodeId, RenderState, Renderer, Target};
use crate::listener::{
    Descriptor, Listener, ListenerHandle, ListenerId, ListenerInfo, LoadState, SourceFilter,
    SourceFilters,
};
use crate::registry::EventTargetRegistry;
use crate::report::{ManagerStats, PerformanceEntry};
use crate::visibility::{
    scroll_parent, select_backend, BackendContext, Mode, Throttle, VisibilityBackend,
};

/// A render state change waiting to be delivered outside the lock.
#[derive(Debug, Clone)]
struct Notice {
    info: ListenerInfo,
    state: RenderState,
    from_cache: bool,
    dispatch: bool,
}

struct ManagerState {
    config: LazyConfig,
    listeners: Vec<Listener>,
    registry: EventTargetRegistry,
    backend: Box<dyn VisibilityBackend>,
    cache: ResourceCache,
    throttle: Throttle,
    filters: SourceFilters,
    next_id: u64,
    timer_armed: bool,
    passes: u64,
    cache_hits: u64,
}

impl ManagerState {
    fn position(&self, element: NodeId) -> Option<usize> {
        self.listeners.iter().position(|l| l.element() == element)
    }

    fn position_of(&self, id: ListenerId) -> Option<usize> {
        self.listeners.iter().position(|l| l.id() == id)
    }

    fn notice(&self, listener: &Listener, state: RenderState, from_cache: bool) -> Notice {
        Notice {
            info: listener.info(),
            state,
            from_cache,
            dispatch: self.config.dispatch_platform_event,
        }
    }

    /// Drop the listener at `idx` and every reference it holds.
    fn remove_at(&mut self, idx: usize, host: &dyn Host) -> Listener {
        let listener = self.listeners.remove(idx);
        self.registry.release(Target::Window, host);
        if listener.target() != Target::Window {
            self.registry.release(listener.target(), host);
        }
        self.backend.unwatch(host, listener.element());
        listener
    }

    /// Tear down the active backend and activate one for `mode`.
    fn replace_backend(&mut self, mode: Mode, host: &dyn Host) -> Mode {
        let elements: Vec<NodeId> = self.listeners.iter().map(Listener::element).collect();
        let mut ctx = BackendContext {
            host,
            registry: &mut self.registry,
        };
        self.backend.deactivate(&mut ctx);

        let mut backend = select_backend(mode, host, &self.config);
        backend.activate(&mut ctx, &elements);
        let effective = backend.mode();
        self.backend = backend;
        effective
    }
}

struct Shared {
    state: Mutex<ManagerState>,
    bus: EventBus,
    adapters: Adapters,
    host: Arc<dyn Host>,
    renderer: Arc<dyn Renderer>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    scanning: AtomicBool,
    rescan: AtomicBool,
    fetches_started: AtomicU64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Builder for [`Manager`].
pub struct ManagerBuilder {
    host: Arc<dyn Host>,
    renderer: Arc<dyn Renderer>,
    fetcher: Arc<dyn Fetcher>,
    config: LazyConfig,
    clock: Option<Arc<dyn Clock>>,
    runtime: Option<Handle>,
    filters: SourceFilters,
    adapters: Adapters,
}

impl ManagerBuilder {
    pub fn config(mut self, config: LazyConfig) -> Self {
        self.config = config;
        self
    }

    /// Time source for throttling and load timing (default: system clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Runtime to spawn fetch tasks on (default: the current runtime).
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Append a source filter.
    pub fn filter(mut self, filter: impl SourceFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Register lifecycle hooks.
    pub fn adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    pub fn build(self) -> Result<Manager, LazyError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| LazyError::NoRuntime)?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let config = self.config;

        let mut registry = EventTargetRegistry::new(config.listen_events.clone());
        let mut backend = select_backend(config.mode, self.host.as_ref(), &config);
        backend.activate(
            &mut BackendContext {
                host: self.host.as_ref(),
                registry: &mut registry,
            },
            &[],
        );

        tracing::info!(
            mode = %backend.mode(),
            preload_factor = config.preload_factor,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            max_attempts = config.max_attempts,
            cache_capacity = config.cache_capacity,
            adapters = self.adapters.len(),
            "Lazy load manager started"
        );

        let state = ManagerState {
            cache: ResourceCache::new(config.cache_capacity),
            throttle: Throttle::new(config.poll_interval),
            filters: self.filters,
            listeners: Vec::new(),
            registry,
            backend,
            next_id: 1,
            timer_armed: false,
            passes: 0,
            cache_hits: 0,
            config,
        };

        Ok(Manager {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                bus: EventBus::new(),
                adapters: self.adapters,
                host: self.host,
                renderer: self.renderer,
                fetcher: self.fetcher,
                clock,
                runtime,
                scanning: AtomicBool::new(false),
                rescan: AtomicBool::new(false),
                fetches_started: AtomicU64::new(0),
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }
}

/// Handle to a lazy loading engine instance.
#[derive(Clone)]
pub struct Manager {
    shared: Arc<Shared>,
}

impl Manager {
    pub fn builder(
        host: Arc<dyn Host>,
        renderer: Arc<dyn Renderer>,
        fetcher: Arc<dyn Fetcher>,
    ) -> ManagerBuilder {
        ManagerBuilder {
            host,
            renderer,
            fetcher,
            config: LazyConfig::default(),
            clock: None,
            runtime: None,
            filters: SourceFilters::new(),
            adapters: Adapters::new(),
        }
    }

    /// Start tracking `element`, or update it if it is already tracked.
    ///
    /// Renders the placeholder, registers the element with its scroll target
    /// and the backend, then runs one scheduling pass.
    pub fn bind(&self, element: NodeId, descriptor: Descriptor) -> ListenerHandle {
        let host = self.shared.host.as_ref();
        let now = self.shared.clock.now();

        let (handle, notice) = {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;

            match state.position(element) {
                Some(idx) => (Self::update_at(state, idx, &descriptor, host), None),
                None => {
                    if descriptor.source.is_none() && descriptor.srcset.is_none() {
                        if state.config.silent {
                            tracing::debug!(element = %element, "Bound element has no source");
                        } else {
                            tracing::warn!(element = %element, "Bound element has no source");
                        }
                    }

                    let target = descriptor
                        .container_hint
                        .as_deref()
                        .and_then(|hint| host.find_container(hint))
                        .map(Target::Node)
                        .unwrap_or_else(|| scroll_parent(host, element));
                    let sources =
                        descriptor.resolve(&state.config, host.container_width(element), &state.filters);

                    let id = ListenerId(state.next_id);
                    state.next_id += 1;
                    let listener = Listener::new(
                        id,
                        element,
                        target,
                        sources,
                        descriptor.bind_target.clone(),
                        state.config.max_attempts,
                        now,
                    );
                    let notice = state.notice(&listener, RenderState::Loading, false);
                    state.listeners.push(listener);

                    // One window reference per listener, plus its scroll
                    // container when that is not the window itself.
                    state.registry.acquire(Target::Window, host);
                    if target != Target::Window {
                        state.registry.acquire(target, host);
                    }
                    state.backend.watch(host, element);

                    tracing::debug!(
                        listener = %id,
                        element = %element,
                        scroll_target = %target,
                        "Bound element"
                    );
                    (ListenerHandle { id, element }, Some(notice))
                }
            }
        };

        if let Some(notice) = notice {
            self.deliver(vec![notice]);
        }
        self.force_schedule_check();
        handle
    }

    /// Alias of [`bind`](Self::bind) for binding layers with a separate
    /// update hook.
    pub fn update(&self, element: NodeId, descriptor: Descriptor) -> ListenerHandle {
        self.bind(element, descriptor)
    }

    fn update_at(
        state: &mut ManagerState,
        idx: usize,
        descriptor: &Descriptor,
        host: &dyn Host,
    ) -> ListenerHandle {
        let element = state.listeners[idx].element();
        let sources = descriptor.resolve(&state.config, host.container_width(element), &state.filters);
        let listener = &mut state.listeners[idx];

        if listener.update(sources, descriptor.bind_target.clone()) {
            tracing::debug!(
                listener = %listener.id(),
                source = ?listener.source(),
                "Source changed, listener reset"
            );
        }
        let handle = ListenerHandle {
            id: listener.id(),
            element,
        };
        state.backend.watch(host, element);
        handle
    }

    /// Stop tracking `element`. Unknown elements are ignored.
    ///
    /// Returns whether a listener was removed.
    pub fn unbind(&self, element: NodeId) -> bool {
        let host = self.shared.host.as_ref();
        let mut state = self.shared.state.lock();
        let Some(idx) = state.position(element) else {
            return false;
        };
        let listener = state.remove_at(idx, host);
        tracing::debug!(listener = %listener.id(), element = %element, "Unbound element");
        true
    }

    /// Switch the visibility backend.
    ///
    /// Returns the mode actually in effect, which is polling when observer
    /// mode was requested on a host without support.
    pub fn set_mode(&self, mode: Mode) -> Mode {
        let host = self.shared.host.as_ref();
        let mut state = self.shared.state.lock();
        state.config.mode = mode;
        let effective = state.replace_backend(mode, host);
        tracing::info!(requested = %mode, effective = %effective, "Visibility mode switched");
        effective
    }

    /// The active backend's mode.
    pub fn mode(&self) -> Mode {
        self.shared.state.lock().backend.mode()
    }

    /// Apply a partial configuration update.
    pub fn configure(&self, update: ConfigUpdate) {
        let host = self.shared.host.as_ref();
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let previous = state.config.clone();
        state.config.apply(&update);

        if state.config.cache_capacity != previous.cache_capacity {
            state.cache.set_capacity(state.config.cache_capacity);
        }
        if state.config.poll_interval != previous.poll_interval {
            state.throttle.set_interval(state.config.poll_interval);
        }
        if state.config.listen_events != previous.listen_events {
            state.registry.set_events(state.config.listen_events.clone(), host);
        }
        if state.config.max_attempts != previous.max_attempts {
            let max_attempts = state.config.max_attempts;
            for listener in &mut state.listeners {
                listener.set_max_attempts(max_attempts);
            }
        }

        let backend_stale = state.config.mode != previous.mode
            || state.config.preload_zone() != previous.preload_zone()
            || state.config.observer != previous.observer;
        if backend_stale {
            let mode = state.config.mode;
            state.replace_backend(mode, host);
        }

        tracing::debug!(?update, "Configuration updated");
    }

    /// Current configuration.
    pub fn config(&self) -> LazyConfig {
        self.shared.state.lock().config.clone()
    }

    /// Append a source filter for future resolutions.
    pub fn add_filter(&self, filter: impl SourceFilter + 'static) {
        self.shared.state.lock().filters.push(Arc::new(filter));
    }

    /// Per-listener load timing in binding order.
    pub fn performance(&self) -> Vec<PerformanceEntry> {
        self.shared
            .state
            .lock()
            .listeners
            .iter()
            .map(Listener::performance)
            .collect()
    }

    /// Snapshot of the listener tracking `element`.
    pub fn listener(&self, element: NodeId) -> Option<ListenerInfo> {
        let now = self.shared.clock.now();
        let state = self.shared.state.lock();
        state
            .position(element)
            .map(|idx| state.listeners[idx].info_at(now))
    }

    /// Snapshots of every listener in binding order.
    pub fn listeners(&self) -> Vec<ListenerInfo> {
        self.shared
            .state
            .lock()
            .listeners
            .iter()
            .map(Listener::info)
            .collect()
    }

    /// Whether `resource` is in the cache. Does not count as a cache lookup.
    pub fn is_cached(&self, resource: &str) -> bool {
        self.shared.state.lock().cache.iter().any(|r| r == resource)
    }

    /// Reference count of a scroll target in the registry.
    pub fn target_refcount(&self, target: Target) -> usize {
        self.shared.state.lock().registry.refcount(target)
    }

    pub fn stats(&self) -> ManagerStats {
        let state = self.shared.state.lock();
        let count = |pred: fn(LoadState) -> bool| {
            state.listeners.iter().filter(|l| pred(l.state())).count()
        };

        ManagerStats {
            listeners: state.listeners.len(),
            loaded: count(|s| s == LoadState::Loaded),
            errored: count(|s| {
                matches!(s, LoadState::ErroredRetryable | LoadState::ErroredTerminal)
            }),
            pending: count(|s| matches!(s, LoadState::Idle | LoadState::AttemptingLoad)),
            targets: state.registry.len(),
            passes: state.passes,
            fetches_started: self.shared.fetches_started.load(Ordering::Relaxed),
            cache_hits: state.cache_hits,
            ..ManagerStats::default()
        }
        .with_cache(state.cache.stats())
    }

    /// The global event bus.
    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    pub fn subscribe<F>(&self, state: RenderState, callback: F) -> SubscriptionId
    where
        F: Fn(&ListenerInfo, bool) + Send + Sync + 'static,
    {
        self.shared.bus.subscribe(state, callback)
    }

    pub fn subscribe_once<F>(&self, state: RenderState, callback: F) -> SubscriptionId
    where
        F: Fn(&ListenerInfo, bool) + Send + Sync + 'static,
    {
        self.shared.bus.subscribe_once(state, callback)
    }

    pub fn unsubscribe(&self, state: RenderState, id: SubscriptionId) -> bool {
        self.shared.bus.unsubscribe(state, id)
    }

    pub fn unsubscribe_all(&self, state: RenderState) {
        self.shared.bus.unsubscribe_all(state)
    }

    /// Wait until every spawned fetch task has finished.
    pub async fn settle(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.shared.tasks.lock());
            if handles.is_empty() {
                break;
            }
            for result in futures::future::join_all(handles).await {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Fetch task failed");
                }
            }
        }
    }

    /// Hand render notices to the renderer, the bus, the adapters and the host.
    fn deliver(&self, notices: Vec<Notice>) {
        if notices.is_empty() {
            return;
        }
        let config = (!self.shared.adapters.is_empty()).then(|| self.config());

        for notice in notices {
            self.shared
                .renderer
                .render(&notice.info, notice.state, notice.from_cache);
            self.shared
                .bus
                .emit(notice.state, &notice.info, notice.from_cache);
            if let Some(config) = &config {
                self.shared.adapters.on_state(notice.state, &notice.info, config);
            }
            if notice.dispatch {
                self.shared
                    .host
                    .dispatch_event(notice.info.element, notice.state, &notice.info);
            }
        }
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Manager")
            .field("mode", &state.backend.mode())
            .field("listeners", &state.listeners.len())
            .field("targets", &state.registry.len())
            .field("cache", &state.cache.len())
            .finish()
    }
}
