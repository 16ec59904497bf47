//! In-memory collaborators for tests and scenario replay.
//!
//! - [`SimHost`]: a node tree with layout rectangles, overflow styles, window
//!   and container scroll offsets, and bookkeeping of every subscription and
//!   observation the engine makes.
//! - [`ScriptedFetcher`]: fetch outcomes scripted per URL, with call counters
//!   and the ability to hold a fetch open until released.
//! - [`RecordingRenderer`]: records every render callback.

mod fetcher;
mod host;
mod renderer;

pub use fetcher::ScriptedFetcher;
pub use host::SimHost;
pub use renderer::{RecordingRenderer, RenderRecord};
