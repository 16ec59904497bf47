//! Host environment seams.
//!
//! The engine never touches a real document. Everything it needs from the
//! surrounding UI runtime goes through these traits so the binding layer can
//! be a browser bridge, a native toolkit adapter or the in-memory simulator
//! in [`crate::sim`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, RootMargin, Viewport};
use crate::listener::ListenerInfo;

/// Opaque identity of a node in the host document.
///
/// Bound elements and scroll containers share this id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that emits scroll-like signals: the window or a scroll container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Window,
    Node(NodeId),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Window => write!(f, "window"),
            Target::Node(id) => write!(f, "node {}", id),
        }
    }
}

/// Render state reported to the renderer and the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderState {
    Loading,
    Loaded,
    Error,
}

impl RenderState {
    /// All states, in bus registration order.
    pub const ALL: [RenderState; 3] = [RenderState::Loading, RenderState::Loaded, RenderState::Error];

    /// Marker value the host writes onto the element.
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderState::Loading => "loading",
            RenderState::Loaded => "loaded",
            RenderState::Error => "error",
        }
    }

    /// Parse a marker value (case-insensitive).
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "loading" => Some(RenderState::Loading),
            "loaded" => Some(RenderState::Loaded),
            "error" => Some(RenderState::Error),
            _ => None,
        }
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options handed to the host's native intersection observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverInit {
    pub root_margin: RootMargin,
    pub threshold: f64,
}

/// One record delivered by the host's intersection observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub target: NodeId,
    pub is_intersecting: bool,
}

impl IntersectionEntry {
    pub fn new(target: NodeId, is_intersecting: bool) -> Self {
        Self {
            target,
            is_intersecting,
        }
    }
}

/// The document and event system the engine runs against.
///
/// Calls arrive from within scheduling passes and `bind`/`unbind`; the manager
/// holds its state lock during subscription calls, so implementations must
/// not call back into the manager from `add_event_listener`,
/// `remove_event_listener`, `observe` or `unobserve`.
pub trait Host: Send + Sync {
    /// Inner window dimensions.
    fn viewport(&self) -> Viewport;

    /// Current bounding rectangle of a node, or `None` if it has no layout.
    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;

    /// Whether the node is still attached to the document.
    fn is_attached(&self, node: NodeId) -> bool;

    /// Parent of a node, or `None` at the top of the tree.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Whether the node is the document body or root element.
    ///
    /// Ancestor resolution stops here and falls back to the window.
    fn is_document_root(&self, _node: NodeId) -> bool {
        false
    }

    /// Computed value of a style property (`overflow`, `overflow-x`, ...).
    fn computed_style(&self, node: NodeId, property: &str) -> Option<String>;

    /// Resolve a named container hint (ref name or element id).
    fn find_container(&self, _hint: &str) -> Option<NodeId> {
        None
    }

    /// Layout width of the node's container, used for `srcset` selection.
    fn container_width(&self, _node: NodeId) -> Option<f64> {
        None
    }

    /// Capability check for native intersection observation.
    fn supports_intersection_observer(&self) -> bool;

    /// Subscribe the engine's signal handler to `event` on `target`.
    fn add_event_listener(&self, target: Target, event: &str);

    /// Remove a subscription made by [`add_event_listener`](Self::add_event_listener).
    fn remove_event_listener(&self, target: Target, event: &str);

    /// Start native intersection observation of a node.
    fn observe(&self, _node: NodeId, _init: &ObserverInit) {}

    /// Stop native intersection observation of a node.
    fn unobserve(&self, _node: NodeId) {}

    /// Emit a platform custom event on the element carrying the listener.
    fn dispatch_event(&self, _node: NodeId, _state: RenderState, _listener: &ListenerInfo) {}
}

/// Receives every render state change of every listener.
///
/// The host sets the visible resource (see [`ListenerInfo::render_value`])
/// and writes the state marker onto the element.
pub trait Renderer: Send + Sync {
    fn render(&self, listener: &ListenerInfo, state: RenderState, from_cache: bool);
}

impl<F> Renderer for F
where
    F: Fn(&ListenerInfo, RenderState, bool) + Send + Sync,
{
    fn render(&self, listener: &ListenerInfo, state: RenderState, from_cache: bool) {
        self(listener, state, from_cache)
    }
}
