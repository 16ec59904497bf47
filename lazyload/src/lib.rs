//! LazyLoad - Visibility-driven deferred resource loading
//!
//! This library defers fetching of off-screen visual resources in scrolling
//! interfaces until they approach the viewport. A [`Manager`] tracks bound
//! elements, decides when each one becomes eligible through a pluggable
//! visibility backend (throttled polling or native intersection callbacks),
//! and drives a per-element load state machine with retries and a resource
//! cache fast path.
//!
//! The surrounding UI runtime is reached only through the [`Host`],
//! [`Renderer`] and [`Fetcher`] traits. The [`sim`] module provides in-memory
//! implementations used by the tests and the `lazyload` CLI.

pub mod adapter;
pub mod bus;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;
pub mod geometry;
pub mod host;
pub mod listener;
pub mod logging;
pub mod manager;
pub mod registry;
pub mod report;
pub mod sim;
pub mod visibility;

pub use adapter::Adapter;
pub use bus::{EventBus, RenderEvent, SubscriptionId};
pub use config::{ConfigUpdate, LazyConfig, ObserverOptions};
pub use error::{ConfigError, FetchError, LazyError};
pub use fetch::{FetchedResource, Fetcher, HttpFetcher};
pub use host::{Host, IntersectionEntry, NodeId, RenderState, Renderer, Target};
pub use listener::{Descriptor, ListenerHandle, ListenerInfo, LoadState};
pub use manager::{Manager, ManagerBuilder};
pub use report::{ManagerStats, PerformanceEntry, ReportSummary};
pub use visibility::Mode;

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
