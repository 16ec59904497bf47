//! Per-state lifecycle hooks.
//!
//! An [`Adapter`] is told about every render state change after the renderer
//! and the event bus, and about every primary fetch just before it starts.
//! Each hook receives the listener snapshot and the manager's configuration
//! at that moment. All hooks default to doing nothing.

use std::sync::Arc;

use crate::config::LazyConfig;
use crate::host::RenderState;
use crate::listener::ListenerInfo;

/// Lifecycle hooks registered on a manager.
pub trait Adapter: Send + Sync {
    fn loading(&self, _listener: &ListenerInfo, _config: &LazyConfig) {}

    fn loaded(&self, _listener: &ListenerInfo, _config: &LazyConfig) {}

    fn error(&self, _listener: &ListenerInfo, _config: &LazyConfig) {}

    /// Called once per fetch attempt, after the placeholder and before the
    /// primary resource is requested.
    fn before_load(&self, _listener: &ListenerInfo, _config: &LazyConfig) {}
}

/// Registered adapters, called in registration order.
#[derive(Clone, Default)]
pub struct Adapters {
    adapters: Vec<Arc<dyn Adapter>>,
}

impl Adapters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.push(adapter);
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Run the hook matching `state`.
    pub fn on_state(&self, state: RenderState, listener: &ListenerInfo, config: &LazyConfig) {
        for adapter in &self.adapters {
            match state {
                RenderState::Loading => adapter.loading(listener, config),
                RenderState::Loaded => adapter.loaded(listener, config),
                RenderState::Error => adapter.error(listener, config),
            }
        }
    }

    pub fn before_load(&self, listener: &ListenerInfo, config: &LazyConfig) {
        for adapter in &self.adapters {
            adapter.before_load(listener, config);
        }
    }
}

impl std::fmt::Debug for Adapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapters")
            .field("count", &self.adapters.len())
            .finish()
    }
}
