//! Simulated document.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::geometry::{Rect, Viewport};
use crate::host::{Host, IntersectionEntry, NodeId, ObserverInit, RenderState, Target};
use crate::listener::ListenerInfo;

#[derive(Debug, Clone)]
struct SimNode {
    name: String,
    parent: Option<NodeId>,
    /// Layout in document coordinates (before any scrolling).
    layout: Rect,
    styles: HashMap<String, String>,
    attached: bool,
    root: bool,
    scroll: (f64, f64),
}

#[derive(Debug)]
struct SimState {
    viewport: Viewport,
    nodes: HashMap<NodeId, SimNode>,
    next_id: u64,
    window_scroll: (f64, f64),
    observer_supported: bool,
    subscriptions: HashMap<(Target, String), usize>,
    add_calls: HashMap<Target, usize>,
    remove_calls: HashMap<Target, usize>,
    observed: HashMap<NodeId, ObserverInit>,
    dispatched: Vec<(NodeId, RenderState)>,
}

/// In-memory [`Host`].
///
/// Bounding rectangles are layout rectangles shifted by the window scroll
/// offset and by the scroll offset of every ancestor container.
#[derive(Debug)]
pub struct SimHost {
    state: Mutex<SimState>,
}

impl SimHost {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            state: Mutex::new(SimState {
                viewport,
                nodes: HashMap::new(),
                next_id: 1,
                window_scroll: (0.0, 0.0),
                observer_supported: true,
                subscriptions: HashMap::new(),
                add_calls: HashMap::new(),
                remove_calls: HashMap::new(),
                observed: HashMap::new(),
                dispatched: Vec::new(),
            }),
        }
    }

    /// Toggle native intersection observer support.
    pub fn with_intersection_observer(self, supported: bool) -> Self {
        self.state.lock().observer_supported = supported;
        self
    }

    /// Add the document root (body). Ancestor walks stop here.
    pub fn add_root(&self, name: &str) -> NodeId {
        let id = self.insert(name, None, Rect::default());
        if let Some(node) = self.state.lock().nodes.get_mut(&id) {
            node.root = true;
        }
        id
    }

    /// Add a node with a layout rectangle in document coordinates.
    pub fn add_node(&self, name: &str, parent: Option<NodeId>, layout: Rect) -> NodeId {
        self.insert(name, parent, layout)
    }

    fn insert(&self, name: &str, parent: Option<NodeId>, layout: Rect) -> NodeId {
        let mut state = self.state.lock();
        let id = NodeId(state.next_id);
        state.next_id += 1;
        state.nodes.insert(
            id,
            SimNode {
                name: name.to_string(),
                parent,
                layout,
                styles: HashMap::new(),
                attached: true,
                root: false,
                scroll: (0.0, 0.0),
            },
        );
        id
    }

    pub fn node_named(&self, name: &str) -> Option<NodeId> {
        let state = self.state.lock();
        let mut matches: Vec<NodeId> = state
            .nodes
            .iter()
            .filter(|(_, node)| node.name == name)
            .map(|(id, _)| *id)
            .collect();
        matches.sort();
        matches.first().copied()
    }

    pub fn set_style(&self, node: NodeId, property: &str, value: &str) {
        if let Some(n) = self.state.lock().nodes.get_mut(&node) {
            n.styles.insert(property.to_string(), value.to_string());
        }
    }

    /// Shorthand for the `overflow` property.
    pub fn set_overflow(&self, node: NodeId, value: &str) {
        self.set_style(node, "overflow", value);
    }

    pub fn set_layout(&self, node: NodeId, layout: Rect) {
        if let Some(n) = self.state.lock().nodes.get_mut(&node) {
            n.layout = layout;
        }
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.state.lock().viewport = viewport;
    }

    /// Remove a node (and so its subtree) from the document.
    pub fn detach(&self, node: NodeId) {
        if let Some(n) = self.state.lock().nodes.get_mut(&node) {
            n.attached = false;
        }
    }

    pub fn scroll_window_to(&self, x: f64, y: f64) {
        self.state.lock().window_scroll = (x, y);
    }

    pub fn scroll_window_by(&self, dx: f64, dy: f64) {
        let mut state = self.state.lock();
        state.window_scroll.0 += dx;
        state.window_scroll.1 += dy;
    }

    pub fn window_scroll(&self) -> (f64, f64) {
        self.state.lock().window_scroll
    }

    /// Scroll a container's content. Descendants move, the container does not.
    pub fn scroll_node_to(&self, node: NodeId, x: f64, y: f64) {
        if let Some(n) = self.state.lock().nodes.get_mut(&node) {
            n.scroll = (x, y);
        }
    }

    /// Total `add_event_listener` calls made for `target`.
    pub fn subscribe_calls(&self, target: Target) -> usize {
        self.state.lock().add_calls.get(&target).copied().unwrap_or(0)
    }

    /// Total `remove_event_listener` calls made for `target`.
    pub fn unsubscribe_calls(&self, target: Target) -> usize {
        self.state.lock().remove_calls.get(&target).copied().unwrap_or(0)
    }

    pub fn is_subscribed(&self, target: Target, event: &str) -> bool {
        self.state
            .lock()
            .subscriptions
            .get(&(target, event.to_string()))
            .is_some_and(|count| *count > 0)
    }

    /// Live subscriptions across all targets and events.
    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions.values().sum()
    }

    /// Targets with at least one live subscription.
    pub fn subscribed_targets(&self) -> Vec<Target> {
        let state = self.state.lock();
        let mut targets: Vec<Target> = state
            .subscriptions
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|((target, _), _)| *target)
            .collect();
        targets.sort_by_key(|t| match t {
            Target::Window => 0,
            Target::Node(id) => id.0 + 1,
        });
        targets.dedup();
        targets
    }

    pub fn is_observed(&self, node: NodeId) -> bool {
        self.state.lock().observed.contains_key(&node)
    }

    pub fn observer_init(&self, node: NodeId) -> Option<ObserverInit> {
        self.state.lock().observed.get(&node).copied()
    }

    pub fn observed_count(&self) -> usize {
        self.state.lock().observed.len()
    }

    /// Platform events dispatched so far.
    pub fn dispatched(&self) -> Vec<(NodeId, RenderState)> {
        self.state.lock().dispatched.clone()
    }

    /// What a native observer would currently report for every observed node.
    pub fn intersections(&self) -> Vec<IntersectionEntry> {
        let observed: Vec<(NodeId, ObserverInit)> = {
            let state = self.state.lock();
            state.observed.iter().map(|(id, init)| (*id, *init)).collect()
        };
        let viewport = self.viewport();

        let mut entries: Vec<IntersectionEntry> = observed
            .into_iter()
            .filter(|(node, _)| self.is_attached(*node))
            .map(|(node, init)| {
                let root = init.root_margin.expand(&viewport.bounds());
                let intersecting = self.bounding_rect(node).is_some_and(|rect| {
                    if init.threshold <= 0.0 {
                        rect.intersects(&root)
                    } else {
                        rect.intersection_ratio(&root) >= init.threshold
                    }
                });
                IntersectionEntry::new(node, intersecting)
            })
            .collect();
        entries.sort_by_key(|e| e.target);
        entries
    }
}

impl Host for SimHost {
    fn viewport(&self) -> Viewport {
        self.state.lock().viewport
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        let state = self.state.lock();
        let target = state.nodes.get(&node)?;
        let (mut dx, mut dy) = state.window_scroll;

        let mut ancestor = target.parent;
        while let Some(id) = ancestor {
            let Some(parent) = state.nodes.get(&id) else {
                break;
            };
            dx += parent.scroll.0;
            dy += parent.scroll.1;
            ancestor = parent.parent;
        }

        Some(target.layout.translate(-dx, -dy))
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let state = self.state.lock();
        let mut current = Some(node);
        while let Some(id) = current {
            match state.nodes.get(&id) {
                Some(n) if n.attached => current = n.parent,
                _ => return false,
            }
        }
        true
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.state.lock().nodes.get(&node).and_then(|n| n.parent)
    }

    fn is_document_root(&self, node: NodeId) -> bool {
        self.state.lock().nodes.get(&node).is_some_and(|n| n.root)
    }

    fn computed_style(&self, node: NodeId, property: &str) -> Option<String> {
        self.state
            .lock()
            .nodes
            .get(&node)
            .and_then(|n| n.styles.get(property).cloned())
    }

    fn find_container(&self, hint: &str) -> Option<NodeId> {
        self.node_named(hint)
    }

    fn container_width(&self, node: NodeId) -> Option<f64> {
        let state = self.state.lock();
        let parent = state.nodes.get(&node)?.parent?;
        state.nodes.get(&parent).map(|p| p.layout.width())
    }

    fn supports_intersection_observer(&self) -> bool {
        self.state.lock().observer_supported
    }

    fn add_event_listener(&self, target: Target, event: &str) {
        let mut state = self.state.lock();
        *state.subscriptions.entry((target, event.to_string())).or_insert(0) += 1;
        *state.add_calls.entry(target).or_insert(0) += 1;
    }

    fn remove_event_listener(&self, target: Target, event: &str) {
        let mut state = self.state.lock();
        if let Some(count) = state.subscriptions.get_mut(&(target, event.to_string())) {
            *count = count.saturating_sub(1);
        }
        *state.remove_calls.entry(target).or_insert(0) += 1;
    }

    fn observe(&self, node: NodeId, init: &ObserverInit) {
        self.state.lock().observed.insert(node, *init);
    }

    fn unobserve(&self, node: NodeId) {
        self.state.lock().observed.remove(&node);
    }

    fn dispatch_event(&self, node: NodeId, state: RenderState, _listener: &ListenerInfo) {
        self.state.lock().dispatched.push((node, state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_rect_follows_scroll() {
        let host = SimHost::new(Viewport::new(800.0, 600.0));
        let body = host.add_root("body");
        let list = host.add_node("list", Some(body), Rect::from_origin(0.0, 100.0, 400.0, 300.0));
        let img = host.add_node("img", Some(list), Rect::from_origin(0.0, 500.0, 100.0, 100.0));

        host.scroll_window_to(0.0, 50.0);
        host.scroll_node_to(list, 0.0, 200.0);

        assert_eq!(host.bounding_rect(img).unwrap().top, 250.0);
        assert_eq!(host.bounding_rect(list).unwrap().top, 50.0);
    }

    #[test]
    fn test_detaching_ancestor_detaches_subtree() {
        let host = SimHost::new(Viewport::new(800.0, 600.0));
        let body = host.add_root("body");
        let list = host.add_node("list", Some(body), Rect::default());
        let img = host.add_node("img", Some(list), Rect::default());

        host.detach(list);

        assert!(!host.is_attached(img));
        assert!(host.is_attached(body));
    }

    #[test]
    fn test_subscription_bookkeeping() {
        let host = SimHost::new(Viewport::new(800.0, 600.0));
        host.add_event_listener(Target::Window, "scroll");
        host.add_event_listener(Target::Window, "resize");
        host.remove_event_listener(Target::Window, "scroll");

        assert!(!host.is_subscribed(Target::Window, "scroll"));
        assert!(host.is_subscribed(Target::Window, "resize"));
        assert_eq!(host.subscribe_calls(Target::Window), 2);
        assert_eq!(host.unsubscribe_calls(Target::Window), 1);
        assert_eq!(host.subscription_count(), 1);
    }

    #[test]
    fn test_container_width_is_parent_width() {
        let host = SimHost::new(Viewport::new(800.0, 600.0));
        let body = host.add_root("body");
        let card = host.add_node("card", Some(body), Rect::from_origin(0.0, 0.0, 320.0, 200.0));
        let img = host.add_node("img", Some(card), Rect::default());

        assert_eq!(host.container_width(img), Some(320.0));
        assert_eq!(host.find_container("card"), Some(card));
    }
}
