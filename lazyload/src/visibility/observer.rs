//! Native intersection observer backend.

use std::collections::HashSet;

use super::{BackendContext, Mode, VisibilityBackend};
use crate::config::ObserverOptions;
use crate::geometry::{PreloadZone, Rect, Viewport};
use crate::host::{Host, NodeId};

/// Watches each bound element through the host's intersection observer.
///
/// Without an explicit root margin the observer root is the preload zone
/// itself, so a threshold of zero reproduces the polling predicate exactly.
#[derive(Debug, Clone)]
pub struct ObserverBackend {
    zone: PreloadZone,
    options: ObserverOptions,
    observed: HashSet<NodeId>,
}

impl ObserverBackend {
    pub fn new(zone: PreloadZone, options: ObserverOptions) -> Self {
        Self {
            zone,
            options,
            observed: HashSet::new(),
        }
    }

    /// Elements currently under observation.
    pub fn observed(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.observed.iter().copied()
    }

    fn root(&self, viewport: &Viewport) -> Rect {
        match self.options.root_margin {
            Some(margin) => margin.expand(&viewport.bounds()),
            None => self.zone.bounds(viewport),
        }
    }
}

impl VisibilityBackend for ObserverBackend {
    fn mode(&self) -> Mode {
        Mode::Observer
    }

    fn activate(&mut self, ctx: &mut BackendContext<'_>, elements: &[NodeId]) {
        for &element in elements {
            self.watch(ctx.host, element);
        }
        tracing::debug!(elements = elements.len(), "Observer backend activated");
    }

    fn deactivate(&mut self, ctx: &mut BackendContext<'_>) {
        for element in self.observed.drain() {
            ctx.host.unobserve(element);
        }
        tracing::debug!("Observer backend deactivated");
    }

    fn watch(&mut self, host: &dyn Host, element: NodeId) {
        let init = self.options.resolve(&self.zone, &host.viewport());
        if !self.observed.insert(element) {
            // Re-observe so the host picks up fresh options.
            host.unobserve(element);
        }
        host.observe(element, &init);
    }

    fn unwatch(&mut self, host: &dyn Host, element: NodeId) {
        if self.observed.remove(&element) {
            host.unobserve(element);
        }
    }

    fn is_eligible(&self, rect: &Rect, viewport: &Viewport) -> bool {
        let root = self.root(viewport);
        if self.options.threshold <= 0.0 {
            rect.intersects(&root)
        } else {
            rect.intersection_ratio(&root) >= self.options.threshold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RootMargin;
    use crate::registry::EventTargetRegistry;
    use crate::sim::SimHost;

    fn viewport() -> Viewport {
        Viewport::new(800.0, 1000.0)
    }

    #[test]
    fn test_watch_observes_with_derived_margin() {
        let host = SimHost::new(viewport());
        let mut backend = ObserverBackend::new(PreloadZone::new(1.3, 0.0), ObserverOptions::default());

        backend.watch(&host, NodeId(1));

        let init = host.observer_init(NodeId(1)).unwrap();
        assert!((init.root_margin.bottom - 300.0).abs() < 1e-9);
        assert!(host.is_observed(NodeId(1)));
    }

    #[test]
    fn test_deactivate_unobserves_everything() {
        let host = SimHost::new(viewport());
        let mut registry = EventTargetRegistry::new(Vec::new());
        let mut backend = ObserverBackend::new(PreloadZone::new(1.3, 0.0), ObserverOptions::default());
        let mut ctx = BackendContext {
            host: &host,
            registry: &mut registry,
        };

        backend.activate(&mut ctx, &[NodeId(1), NodeId(2)]);
        assert_eq!(host.observed_count(), 2);

        backend.deactivate(&mut ctx);
        assert_eq!(host.observed_count(), 0);
        assert_eq!(backend.observed().count(), 0);
    }

    #[test]
    fn test_unwatch_unknown_element_is_noop() {
        let host = SimHost::new(viewport());
        let mut backend = ObserverBackend::new(PreloadZone::new(1.3, 0.0), ObserverOptions::default());
        backend.unwatch(&host, NodeId(9));
        assert_eq!(host.observed_count(), 0);
    }

    #[test]
    fn test_explicit_margin_replaces_zone() {
        let options = ObserverOptions {
            root_margin: Some(RootMargin::default()),
            threshold: 0.0,
        };
        let backend = ObserverBackend::new(PreloadZone::new(1.3, 0.0), options);
        let below_fold = Rect::from_origin(0.0, 1100.0, 100.0, 100.0);

        assert!(!backend.is_eligible(&below_fold, &viewport()));
    }

    #[test]
    fn test_threshold_requires_visible_fraction() {
        let options = ObserverOptions {
            root_margin: Some(RootMargin::default()),
            threshold: 0.5,
        };
        let backend = ObserverBackend::new(PreloadZone::new(1.0, 0.0), options);

        let mostly_in = Rect::from_origin(0.0, 900.0, 100.0, 150.0);
        let mostly_out = Rect::from_origin(0.0, 960.0, 100.0, 100.0);

        assert!(backend.is_eligible(&mostly_in, &viewport()));
        assert!(!backend.is_eligible(&mostly_out, &viewport()));
    }

    #[test]
    fn test_non_default_options_diverge_from_polling() {
        let zone = PreloadZone::new(1.3, 0.0);
        let edge = Rect::from_origin(0.0, 1280.0, 100.0, 100.0);
        let defaults = ObserverOptions::default();
        let strict = ObserverOptions {
            root_margin: None,
            threshold: 0.5,
        };

        assert!(crate::visibility::eligible_under(Mode::Polling, zone, &defaults, &edge, &viewport()));
        assert!(crate::visibility::eligible_under(Mode::Observer, zone, &defaults, &edge, &viewport()));
        assert!(!crate::visibility::eligible_under(Mode::Observer, zone, &strict, &edge, &viewport()));
    }
}
