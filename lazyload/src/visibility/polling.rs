//! Event-driven polling backend.

use super::{BackendContext, Mode, VisibilityBackend};
use crate::geometry::{PreloadZone, Rect, Viewport};
use crate::host::{Host, NodeId};

/// Subscribes scroll-like events on every referenced target.
///
/// The registry does the subscription bookkeeping; this backend only flips
/// it between listening and idle. Throttling happens in the manager.
#[derive(Debug, Clone)]
pub struct PollingBackend {
    zone: PreloadZone,
}

impl PollingBackend {
    pub fn new(zone: PreloadZone) -> Self {
        Self { zone }
    }
}

impl VisibilityBackend for PollingBackend {
    fn mode(&self) -> Mode {
        Mode::Polling
    }

    fn activate(&mut self, ctx: &mut BackendContext<'_>, _elements: &[NodeId]) {
        ctx.registry.set_listening(true, ctx.host);
        tracing::debug!(targets = ctx.registry.len(), "Polling backend activated");
    }

    fn deactivate(&mut self, ctx: &mut BackendContext<'_>) {
        ctx.registry.set_listening(false, ctx.host);
        tracing::debug!("Polling backend deactivated");
    }

    fn watch(&mut self, _host: &dyn Host, _element: NodeId) {}

    fn unwatch(&mut self, _host: &dyn Host, _element: NodeId) {}

    fn is_eligible(&self, rect: &Rect, viewport: &Viewport) -> bool {
        self.zone.contains(rect, viewport)
    }
}
