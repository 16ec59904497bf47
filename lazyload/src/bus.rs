//! Global render event bus.
//!
//! Subscribers register per [`RenderState`] and are called for every listener
//! that enters that state, independently of the per-manager [`Renderer`].
//! Callbacks run on the thread that completed the state change, outside every
//! manager lock, so they may call back into the manager.
//!
//! Async consumers can instead take a broadcast receiver from
//! [`EventBus::stream`]; slow receivers observe `Lagged` rather than blocking
//! the engine.
//!
//! [`Renderer`]: crate::host::Renderer

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::host::RenderState;
use crate::listener::ListenerInfo;

/// Default capacity of the broadcast stream.
pub const DEFAULT_STREAM_CAPACITY: usize = 256;

/// Callback invoked with the listener snapshot and the cache-hit flag.
pub type BusCallback = Arc<dyn Fn(&ListenerInfo, bool) + Send + Sync>;

/// Handle returned by subscriptions, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A render state change as seen by stream consumers.
#[derive(Debug, Clone)]
pub struct RenderEvent {
    pub state: RenderState,
    pub listener: ListenerInfo,
    pub from_cache: bool,
}

struct Subscriber {
    id: SubscriptionId,
    callback: BusCallback,
    once: bool,
}

/// Typed publish/subscribe registry keyed by render state.
pub struct EventBus {
    subscribers: Mutex<HashMap<RenderState, Vec<Subscriber>>>,
    next_id: AtomicU64,
    stream: broadcast::Sender<RenderEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (stream, _) = broadcast::channel(DEFAULT_STREAM_CAPACITY);
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            stream,
        }
    }

    /// Call `callback` every time a listener enters `state`.
    pub fn subscribe<F>(&self, state: RenderState, callback: F) -> SubscriptionId
    where
        F: Fn(&ListenerInfo, bool) + Send + Sync + 'static,
    {
        self.insert(state, Arc::new(callback), false)
    }

    /// Call `callback` the next time a listener enters `state`, then forget it.
    pub fn subscribe_once<F>(&self, state: RenderState, callback: F) -> SubscriptionId
    where
        F: Fn(&ListenerInfo, bool) + Send + Sync + 'static,
    {
        self.insert(state, Arc::new(callback), true)
    }

    /// Remove one subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, state: RenderState, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let Some(list) = subscribers.get_mut(&state) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != id);
        before != list.len()
    }

    /// Remove every subscription for `state`.
    pub fn unsubscribe_all(&self, state: RenderState) {
        self.subscribers.lock().remove(&state);
    }

    /// Broadcast receiver of every emitted event.
    pub fn stream(&self) -> broadcast::Receiver<RenderEvent> {
        self.stream.subscribe()
    }

    /// Deliver an event to the subscribers of `state`.
    ///
    /// One-shot subscribers are removed before any callback runs.
    pub fn emit(&self, state: RenderState, listener: &ListenerInfo, from_cache: bool) {
        let callbacks: Vec<BusCallback> = {
            let mut subscribers = self.subscribers.lock();
            match subscribers.get_mut(&state) {
                Some(list) => {
                    let callbacks = list.iter().map(|s| Arc::clone(&s.callback)).collect();
                    list.retain(|s| !s.once);
                    callbacks
                }
                None => Vec::new(),
            }
        };

        for callback in callbacks {
            callback(listener, from_cache);
        }

        // No receivers is fine.
        let _ = self.stream.send(RenderEvent {
            state,
            listener: listener.clone(),
            from_cache,
        });
    }

    /// Number of live subscriptions for `state`.
    pub fn subscriber_count(&self, state: RenderState) -> usize {
        self.subscribers.lock().get(&state).map_or(0, Vec::len)
    }

    fn insert(&self, state: RenderState, callback: BusCallback, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .entry(state)
            .or_default()
            .push(Subscriber { id, callback, once });
        id
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self.subscribers.lock();
        let counts: HashMap<RenderState, usize> =
            subscribers.iter().map(|(state, list)| (*state, list.len())).collect();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NodeId;
    use crate::listener::{Listener, ListenerId, ResolvedSources};
    use crate::host::Target;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn info() -> ListenerInfo {
        Listener::new(
            ListenerId(1),
            NodeId(1),
            Target::Window,
            ResolvedSources::new(Some("a.png".to_string())),
            None,
            3,
            Instant::now(),
        )
        .info()
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&ListenerInfo, bool) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_: &ListenerInfo, _: bool| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_subscribe_receives_matching_state_only() {
        let bus = EventBus::new();
        let (count, callback) = counter();
        bus.subscribe(RenderState::Loaded, callback);

        bus.emit(RenderState::Loaded, &info(), false);
        bus.emit(RenderState::Error, &info(), false);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_once_fires_once() {
        let bus = EventBus::new();
        let (count, callback) = counter();
        bus.subscribe_once(RenderState::Loading, callback);

        bus.emit(RenderState::Loading, &info(), false);
        bus.emit(RenderState::Loading, &info(), false);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(RenderState::Loading), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let (count, callback) = counter();
        let id = bus.subscribe(RenderState::Loaded, callback);

        assert!(bus.unsubscribe(RenderState::Loaded, id));
        assert!(!bus.unsubscribe(RenderState::Loaded, id));
        bus.emit(RenderState::Loaded, &info(), false);

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_all() {
        let bus = EventBus::new();
        let (count, a) = counter();
        let (_, b) = counter();
        bus.subscribe(RenderState::Error, a);
        bus.subscribe(RenderState::Error, b);

        bus.unsubscribe_all(RenderState::Error);
        bus.emit(RenderState::Error, &info(), false);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(RenderState::Error), 0);
    }

    #[test]
    fn test_callback_may_subscribe_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe(RenderState::Loaded, move |_, _| {
            inner.subscribe(RenderState::Error, |_, _| {});
        });

        bus.emit(RenderState::Loaded, &info(), true);

        assert_eq!(bus.subscriber_count(RenderState::Error), 1);
    }

    #[tokio::test]
    async fn test_stream_receives_events() {
        let bus = EventBus::new();
        let mut rx = bus.stream();

        bus.emit(RenderState::Loaded, &info(), true);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.state, RenderState::Loaded);
        assert!(event.from_cache);
        assert_eq!(event.listener.source.as_deref(), Some("a.png"));
    }
}
