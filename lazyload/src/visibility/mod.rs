//! Visibility detection backends.
//!
//! A backend decides *when* a scheduling pass should look at listeners and
//! *whether* a given rectangle counts as visible. Two implementations exist:
//!
//! - [`PollingBackend`]: subscribes scroll-like events on every scroll target
//!   through the [`EventTargetRegistry`] and relies on the manager's
//!   [`Throttle`] to coalesce them.
//! - [`ObserverBackend`]: asks the host's native intersection observer to
//!   watch each element directly.
//!
//! Both answer [`VisibilityBackend::is_eligible`] identically for identical
//! geometry, so switching backends never changes which listeners load.
//!
//! # Selection
//!
//! [`select_backend`] is the capability-checked factory: requesting
//! [`Mode::Observer`] on a host without intersection support quietly yields a
//! polling backend.

mod ancestor;
mod observer;
mod polling;
mod throttle;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use ancestor::{is_scrollable, scroll_parent};
pub use observer::ObserverBackend;
pub use polling::PollingBackend;
pub use throttle::{Throttle, ThrottleDecision};

use crate::config::{LazyConfig, ObserverOptions};
use crate::geometry::{PreloadZone, Rect, Viewport};
use crate::host::{Host, NodeId};
use crate::registry::EventTargetRegistry;

/// Visibility detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Throttled passes driven by scroll-like events.
    Polling,
    /// Native intersection callbacks.
    Observer,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Polling => "polling",
            Mode::Observer => "observer",
        }
    }

    /// Parse a mode name. `event` is accepted as an alias for polling.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "polling" | "event" => Some(Mode::Polling),
            "observer" => Some(Mode::Observer),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Borrowed manager state a backend needs while (de)activating.
pub struct BackendContext<'a> {
    pub host: &'a dyn Host,
    pub registry: &'a mut EventTargetRegistry,
}

/// A visibility detection strategy.
///
/// Exactly one backend is active per manager. `deactivate` must remove every
/// subscription or observation the backend made so a replacement starts from
/// a clean host.
pub trait VisibilityBackend: Send + fmt::Debug {
    /// Which strategy this is.
    fn mode(&self) -> Mode;

    /// Start detecting for the given already-bound elements.
    fn activate(&mut self, ctx: &mut BackendContext<'_>, elements: &[NodeId]);

    /// Tear down all subscriptions made by this backend.
    fn deactivate(&mut self, ctx: &mut BackendContext<'_>);

    /// Begin watching a newly bound element.
    fn watch(&mut self, host: &dyn Host, element: NodeId);

    /// Stop watching an element (unbound, pruned or already loaded).
    fn unwatch(&mut self, host: &dyn Host, element: NodeId);

    /// Whether an element with `rect` should load under `viewport`.
    fn is_eligible(&self, rect: &Rect, viewport: &Viewport) -> bool;
}

/// Build the backend for `requested`, downgrading to polling when the host
/// cannot observe intersections.
pub fn select_backend(
    requested: Mode,
    host: &dyn Host,
    config: &LazyConfig,
) -> Box<dyn VisibilityBackend> {
    let zone = config.preload_zone();

    match requested {
        Mode::Observer if host.supports_intersection_observer() => {
            Box::new(ObserverBackend::new(zone, config.observer.clone()))
        }
        Mode::Observer => {
            tracing::debug!("Intersection observer unavailable, falling back to polling");
            Box::new(PollingBackend::new(zone))
        }
        Mode::Polling => Box::new(PollingBackend::new(zone)),
    }
}

/// Eligibility under the given backend parameters, without a backend instance.
///
/// Handy for hosts that want to preview a decision (and for equivalence tests).
pub fn eligible_under(
    mode: Mode,
    zone: PreloadZone,
    observer: &ObserverOptions,
    rect: &Rect,
    viewport: &Viewport,
) -> bool {
    match mode {
        Mode::Polling => PollingBackend::new(zone).is_eligible(rect, viewport),
        Mode::Observer => ObserverBackend::new(zone, observer.clone()).is_eligible(rect, viewport),
    }
}
