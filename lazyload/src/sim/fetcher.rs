//! Scripted fetch outcomes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::error::FetchError;
use crate::fetch::{BoxFuture, FetchedResource, Fetcher};

#[derive(Debug, Default)]
struct Script {
    fail_next: HashMap<String, u32>,
    fail_always: HashSet<String>,
    calls: HashMap<String, u32>,
    order: Vec<String>,
    holds: HashMap<String, Arc<Semaphore>>,
}

/// [`Fetcher`] whose outcomes are scripted per URL.
///
/// Unscripted URLs succeed with an empty payload.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    script: Mutex<Script>,
    latency: Option<Duration>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next `times` fetches of `url`.
    pub fn fail_next(&self, url: &str, times: u32) {
        self.script.lock().fail_next.insert(url.to_string(), times);
    }

    /// Fail every fetch of `url`.
    pub fn fail_always(&self, url: &str) {
        self.script.lock().fail_always.insert(url.to_string());
    }

    /// Make fetches of `url` wait until [`release`](Self::release) is called.
    pub fn hold(&self, url: &str) {
        self.script
            .lock()
            .holds
            .insert(url.to_string(), Arc::new(Semaphore::new(0)));
    }

    /// Let `permits` held fetches of `url` proceed.
    pub fn release(&self, url: &str, permits: usize) {
        if let Some(gate) = self.script.lock().holds.get(url) {
            gate.add_permits(permits);
        }
    }

    /// Number of fetches started for `url`.
    pub fn calls_for(&self, url: &str) -> u32 {
        self.script.lock().calls.get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.script.lock().calls.values().sum()
    }

    /// Every fetched URL in call order.
    pub fn call_order(&self) -> Vec<String> {
        self.script.lock().order.clone()
    }

    fn start(&self, url: &str) -> (Option<Arc<Semaphore>>, Result<FetchedResource, FetchError>) {
        let mut script = self.script.lock();
        *script.calls.entry(url.to_string()).or_insert(0) += 1;
        script.order.push(url.to_string());

        let failing = if script.fail_always.contains(url) {
            true
        } else if let Some(remaining) = script.fail_next.get_mut(url) {
            let fail = *remaining > 0;
            *remaining = remaining.saturating_sub(1);
            fail
        } else {
            false
        };

        let result = if url.is_empty() {
            Err(FetchError::MissingSource)
        } else if failing {
            Err(FetchError::Network(format!("scripted failure for {}", url)))
        } else {
            Ok(FetchedResource::new(url, Vec::new()))
        };

        (script.holds.get(url).cloned(), result)
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchedResource, FetchError>> {
        Box::pin(async move {
            let (gate, result) = self.start(url);
            if let Some(gate) = gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            result
        })
    }
}
