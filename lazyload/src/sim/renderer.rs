//! Render call recorder.

use parking_lot::Mutex;

use crate::host::{NodeId, RenderState, Renderer};
use crate::listener::{ListenerInfo, LoadState};

/// One recorded render call.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRecord {
    pub element: NodeId,
    pub state: RenderState,
    pub listener_state: LoadState,
    pub from_cache: bool,
    /// Value the host would write onto the element.
    pub value: String,
}

/// [`Renderer`] that keeps every call for later inspection.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    records: Mutex<Vec<RenderRecord>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RenderRecord> {
        self.records.lock().clone()
    }

    pub fn records_for(&self, element: NodeId) -> Vec<RenderRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.element == element)
            .cloned()
            .collect()
    }

    pub fn states_for(&self, element: NodeId) -> Vec<RenderState> {
        self.records_for(element).into_iter().map(|r| r.state).collect()
    }

    pub fn listener_states_for(&self, element: NodeId) -> Vec<LoadState> {
        self.records_for(element)
            .into_iter()
            .map(|r| r.listener_state)
            .collect()
    }

    /// Latest render of `element`.
    pub fn last_for(&self, element: NodeId) -> Option<RenderRecord> {
        self.records
            .lock()
            .iter()
            .rev()
            .find(|r| r.element == element)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, listener: &ListenerInfo, state: RenderState, from_cache: bool) {
        self.records.lock().push(RenderRecord {
            element: listener.element,
            state,
            listener_state: listener.state,
            from_cache,
            value: listener.render_value(state),
        });
    }
}
