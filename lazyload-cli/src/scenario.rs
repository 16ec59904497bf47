//! Scroll scenarios replayed by `lazyload simulate`.
//!
//! A scenario describes a document layout, the elements bound for lazy
//! loading and a list of steps (scrolling, waiting, detaching nodes). It runs
//! against the in-memory host on a manual clock, so the same file always
//! produces the same report.
//!
//! # Format
//!
//! ```json
//! {
//!   "viewport": { "width": 800, "height": 1000 },
//!   "latency_ms": 40,
//!   "nodes": [
//!     { "name": "feed", "rect": { "x": 0, "y": 0, "width": 400, "height": 1000 }, "overflow": "auto" },
//!     { "name": "hero", "parent": "feed", "rect": { "x": 0, "y": 1800, "width": 400, "height": 300 } }
//!   ],
//!   "elements": [ { "node": "hero", "source": "https://cdn.example.com/hero.jpg" } ],
//!   "failures": [ { "url": "https://cdn.example.com/hero.jpg", "times": 1 } ],
//!   "steps": [
//!     { "action": "scroll_to", "container": "feed", "y": 1200 },
//!     { "action": "wait", "ms": 250 }
//!   ]
//! }
//! ```
//!
//! Nodes without a parent hang off the implicit `body` root.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lazyload::clock::ManualClock;
use lazyload::error::FetchError;
use lazyload::fetch::{BoxFuture, FetchedResource, Fetcher};
use lazyload::geometry::{Rect, Viewport};
use lazyload::sim::{RecordingRenderer, ScriptedFetcher, SimHost};
use lazyload::{
    Descriptor, LazyConfig, Manager, ManagerStats, Mode, NodeId, PerformanceEntry, ReportSummary,
    Target,
};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Name of the implicit document root.
pub const ROOT_NODE: &str = "body";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub viewport: Viewport,

    /// Whether the simulated host offers native intersection callbacks.
    #[serde(default = "default_true")]
    pub intersection_observer: bool,

    /// Simulated time each fetch takes.
    #[serde(default)]
    pub latency_ms: u64,

    #[serde(default)]
    pub nodes: Vec<NodeSpec>,

    pub elements: Vec<ElementSpec>,

    #[serde(default)]
    pub failures: Vec<FailureSpec>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub rect: RectSpec,
    /// CSS overflow value; `auto` or `scroll` makes the node a scroll target.
    #[serde(default)]
    pub overflow: Option<String>,
}

/// Layout rectangle in document coordinates.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RectSpec {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<RectSpec> for Rect {
    fn from(spec: RectSpec) -> Self {
        Rect::from_origin(spec.x, spec.y, spec.width, spec.height)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElementSpec {
    pub node: String,
    #[serde(flatten)]
    pub descriptor: Descriptor,
}

/// Scripted fetch failures. `times` absent means every fetch fails.
#[derive(Debug, Clone, Deserialize)]
pub struct FailureSpec {
    pub url: String,
    #[serde(default)]
    pub times: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    ScrollTo {
        #[serde(default)]
        container: Option<String>,
        #[serde(default)]
        x: f64,
        y: f64,
    },
    ScrollBy {
        #[serde(default)]
        dx: f64,
        dy: f64,
    },
    Wait {
        ms: u64,
    },
    Resize {
        width: f64,
        height: f64,
    },
    Detach {
        node: String,
    },
    Unbind {
        node: String,
    },
    SetMode {
        mode: Mode,
    },
}

/// Result of a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub mode: Mode,
    pub summary: ReportSummary,
    pub stats: ManagerStats,
    pub performance: Vec<PerformanceEntry>,
}

/// Advances the manual clock by a fixed latency on every fetch.
struct ClockedFetcher {
    inner: Arc<ScriptedFetcher>,
    clock: ManualClock,
    latency: Duration,
}

impl Fetcher for ClockedFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchedResource, FetchError>> {
        Box::pin(async move {
            let result = self.inner.fetch(url).await;
            self.clock.advance(self.latency);
            result
        })
    }
}

/// A scenario wired to a live manager.
pub struct Simulation {
    host: Arc<SimHost>,
    clock: ManualClock,
    manager: Manager,
    nodes: HashMap<String, NodeId>,
    poll_interval: Duration,
}

impl Simulation {
    /// Build the layout, script the fetcher and bind every element.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(scenario: &Scenario, config: LazyConfig) -> Result<Self, CliError> {
        let host = Arc::new(
            SimHost::new(scenario.viewport).with_intersection_observer(scenario.intersection_observer),
        );
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_NODE.to_string(), host.add_root(ROOT_NODE));

        for spec in &scenario.nodes {
            if nodes.contains_key(&spec.name) {
                return Err(CliError::Scenario(format!("duplicate node '{}'", spec.name)));
            }
            let parent = lookup(&nodes, spec.parent.as_deref().unwrap_or(ROOT_NODE))?;
            let id = host.add_node(&spec.name, Some(parent), spec.rect.into());
            if let Some(overflow) = &spec.overflow {
                host.set_overflow(id, overflow);
            }
            nodes.insert(spec.name.clone(), id);
        }

        let scripted = Arc::new(ScriptedFetcher::new());
        for failure in &scenario.failures {
            match failure.times {
                Some(times) => scripted.fail_next(&failure.url, times),
                None => scripted.fail_always(&failure.url),
            }
        }

        let clock = ManualClock::new();
        let fetcher = ClockedFetcher {
            inner: scripted,
            clock: clock.clone(),
            latency: Duration::from_millis(scenario.latency_ms),
        };
        let poll_interval = config.poll_interval;
        let manager = Manager::builder(
            host.clone(),
            Arc::new(RecordingRenderer::new()),
            Arc::new(fetcher),
        )
        .config(config)
        .clock(Arc::new(clock.clone()))
        .build()?;

        let simulation = Self {
            host,
            clock,
            manager,
            nodes,
            poll_interval,
        };
        for element in &scenario.elements {
            let node = simulation.node(&element.node)?;
            simulation.manager.bind(node, element.descriptor.clone());
        }
        Ok(simulation)
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    /// Apply every step, then flush the trailing throttled pass.
    pub async fn run(self, steps: &[Step]) -> Result<Outcome, CliError> {
        self.manager.settle().await;

        for (index, step) in steps.iter().enumerate() {
            tracing::debug!(step = index, ?step, "Applying step");
            self.apply(step)?;
            self.manager.settle().await;
        }

        self.clock.advance(self.poll_interval);
        self.manager.flush_throttled();
        self.manager.settle().await;

        let performance = self.manager.performance();
        let outcome = Outcome {
            mode: self.manager.mode(),
            summary: ReportSummary::from_entries(&performance),
            stats: self.manager.stats(),
            performance,
        };
        tracing::info!(
            listeners = outcome.summary.total,
            loaded = outcome.summary.loaded,
            errored = outcome.summary.errored,
            "Scenario finished"
        );
        Ok(outcome)
    }

    fn apply(&self, step: &Step) -> Result<(), CliError> {
        match step {
            Step::ScrollTo { container: None, x, y } => {
                self.host.scroll_window_to(*x, *y);
                self.signal(Target::Window, "scroll");
            }
            Step::ScrollTo {
                container: Some(name),
                x,
                y,
            } => {
                let node = self.node(name)?;
                self.host.scroll_node_to(node, *x, *y);
                self.signal(Target::Node(node), "scroll");
            }
            Step::ScrollBy { dx, dy } => {
                self.host.scroll_window_by(*dx, *dy);
                self.signal(Target::Window, "scroll");
            }
            Step::Wait { ms } => {
                self.clock.advance(Duration::from_millis(*ms));
                self.manager.flush_throttled();
            }
            Step::Resize { width, height } => {
                self.host.set_viewport(Viewport::new(*width, *height));
                self.signal(Target::Window, "resize");
            }
            Step::Detach { node } => {
                self.host.detach(self.node(node)?);
                self.manager.force_schedule_check();
            }
            Step::Unbind { node } => {
                self.manager.unbind(self.node(node)?);
            }
            Step::SetMode { mode } => {
                let effective = self.manager.set_mode(*mode);
                if effective != *mode {
                    tracing::info!(requested = %mode, effective = %effective, "Mode downgraded");
                }
                self.manager.force_schedule_check();
            }
        }
        Ok(())
    }

    /// Deliver a host signal the way the active backend expects it.
    fn signal(&self, target: Target, event: &str) {
        match self.manager.mode() {
            Mode::Polling => self.manager.on_signal(target, event),
            Mode::Observer => self.manager.on_intersection(&self.host.intersections()),
        }
    }

    fn node(&self, name: &str) -> Result<NodeId, CliError> {
        lookup(&self.nodes, name)
    }
}

fn lookup(nodes: &HashMap<String, NodeId>, name: &str) -> Result<NodeId, CliError> {
    nodes
        .get(name)
        .copied()
        .ok_or_else(|| CliError::Scenario(format!("unknown node '{}'", name)))
}

/// Parse and run a scenario.
pub async fn run(scenario: &Scenario, config: LazyConfig) -> Result<Outcome, CliError> {
    Simulation::new(scenario, config)?.run(&scenario.steps).await
}
