//! Ref-counted scroll target subscriptions.
//!
//! Every listener references the window and its own scroll target. Many
//! listeners usually share one scroll container, so subscriptions are keyed by
//! target and counted: the first `acquire` subscribes, the last `release`
//! unsubscribes and forgets the target.
//!
//! Subscriptions only exist while the registry is *listening*, which the
//! polling backend toggles on activation. Reference counts are kept in both
//! states so switching backends never loses track of a target.

use std::collections::HashMap;

use crate::host::{Host, Target};

#[derive(Debug, Clone, Copy)]
struct TargetEntry {
    refcount: usize,
    subscribed: bool,
}

/// Map from target to reference count and subscription state.
#[derive(Debug)]
pub struct EventTargetRegistry {
    targets: HashMap<Target, TargetEntry>,
    events: Vec<String>,
    listening: bool,
}

impl EventTargetRegistry {
    /// Create an empty, non-listening registry for the given event names.
    pub fn new(events: Vec<String>) -> Self {
        Self {
            targets: HashMap::new(),
            events,
            listening: false,
        }
    }

    /// Add a reference to `target`, subscribing it on first acquisition.
    ///
    /// Returns the new reference count.
    pub fn acquire(&mut self, target: Target, host: &dyn Host) -> usize {
        let entry = self.targets.entry(target).or_insert(TargetEntry {
            refcount: 0,
            subscribed: false,
        });
        entry.refcount += 1;

        if self.listening && !entry.subscribed {
            subscribe(host, target, &self.events);
            entry.subscribed = true;
        }

        tracing::trace!(scroll_target = %target, refcount = entry.refcount, "Target acquired");
        entry.refcount
    }

    /// Drop a reference to `target`, unsubscribing and removing it at zero.
    ///
    /// Returns the remaining reference count; releasing an unknown target is a
    /// no-op that returns 0.
    pub fn release(&mut self, target: Target, host: &dyn Host) -> usize {
        let Some(entry) = self.targets.get_mut(&target) else {
            return 0;
        };

        entry.refcount = entry.refcount.saturating_sub(1);
        let remaining = entry.refcount;

        if remaining == 0 {
            if entry.subscribed {
                unsubscribe(host, target, &self.events);
            }
            self.targets.remove(&target);
            tracing::trace!(scroll_target = %target, "Target released");
        }

        remaining
    }

    /// Turn subscriptions on or off for every known target.
    pub fn set_listening(&mut self, listening: bool, host: &dyn Host) {
        if self.listening == listening {
            return;
        }
        self.listening = listening;

        for (target, entry) in self.targets.iter_mut() {
            if listening && !entry.subscribed {
                subscribe(host, *target, &self.events);
                entry.subscribed = true;
            } else if !listening && entry.subscribed {
                unsubscribe(host, *target, &self.events);
                entry.subscribed = false;
            }
        }
    }

    /// Replace the subscribed event set, re-keying live subscriptions.
    pub fn set_events(&mut self, events: Vec<String>, host: &dyn Host) {
        if events == self.events {
            return;
        }

        for (target, entry) in self.targets.iter() {
            if entry.subscribed {
                unsubscribe(host, *target, &self.events);
                subscribe(host, *target, &events);
            }
        }
        self.events = events;
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn refcount(&self, target: Target) -> usize {
        self.targets.get(&target).map_or(0, |e| e.refcount)
    }

    pub fn is_subscribed(&self, target: Target) -> bool {
        self.targets.get(&target).is_some_and(|e| e.subscribed)
    }

    /// Number of distinct targets referenced.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }
}

fn subscribe(host: &dyn Host, target: Target, events: &[String]) {
    for event in events {
        host.add_event_listener(target, event);
    }
    tracing::debug!(scroll_target = %target, events = events.len(), "Subscribed scroll target");
}

fn unsubscribe(host: &dyn Host, target: Target, events: &[String]) {
    for event in events {
        host.remove_event_listener(target, event);
    }
    tracing::debug!(scroll_target = %target, events = events.len(), "Unsubscribed scroll target");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Viewport;
    use crate::host::NodeId;
    use crate::sim::SimHost;

    fn registry() -> EventTargetRegistry {
        EventTargetRegistry::new(vec!["scroll".to_string(), "resize".to_string()])
    }

    #[test]
    fn test_acquire_subscribes_once() {
        let host = SimHost::new(Viewport::new(800.0, 600.0));
        let mut registry = registry();
        registry.set_listening(true, &host);
        let target = Target::Node(NodeId(10));

        assert_eq!(registry.acquire(target, &host), 1);
        assert_eq!(registry.acquire(target, &host), 2);
        assert_eq!(registry.acquire(target, &host), 3);

        assert_eq!(host.subscribe_calls(target), 2, "one call per event");
        assert!(registry.is_subscribed(target));
    }

    #[test]
    fn test_release_unsubscribes_at_zero() {
        let host = SimHost::new(Viewport::new(800.0, 600.0));
        let mut registry = registry();
        registry.set_listening(true, &host);
        let target = Target::Node(NodeId(10));

        registry.acquire(target, &host);
        registry.acquire(target, &host);

        assert_eq!(registry.release(target, &host), 1);
        assert!(host.is_subscribed(target, "scroll"));

        assert_eq!(registry.release(target, &host), 0);
        assert!(!host.is_subscribed(target, "scroll"));
        assert_eq!(registry.refcount(target), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_unknown_target_is_noop() {
        let host = SimHost::new(Viewport::new(800.0, 600.0));
        let mut registry = registry();
        assert_eq!(registry.release(Target::Window, &host), 0);
        assert_eq!(host.unsubscribe_calls(Target::Window), 0);
    }

    #[test]
    fn test_not_listening_counts_without_subscribing() {
        let host = SimHost::new(Viewport::new(800.0, 600.0));
        let mut registry = registry();

        registry.acquire(Target::Window, &host);

        assert_eq!(registry.refcount(Target::Window), 1);
        assert_eq!(host.subscribe_calls(Target::Window), 0);

        registry.set_listening(true, &host);
        assert!(host.is_subscribed(Target::Window, "resize"));

        registry.set_listening(false, &host);
        assert!(!host.is_subscribed(Target::Window, "resize"));
        assert_eq!(registry.refcount(Target::Window), 1);
    }

    #[test]
    fn test_set_events_rekeys_subscriptions() {
        let host = SimHost::new(Viewport::new(800.0, 600.0));
        let mut registry = registry();
        registry.set_listening(true, &host);
        registry.acquire(Target::Window, &host);

        registry.set_events(vec!["touchmove".to_string()], &host);

        assert!(!host.is_subscribed(Target::Window, "scroll"));
        assert!(host.is_subscribed(Target::Window, "touchmove"));
    }
}
