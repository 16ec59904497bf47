//! Performance reporting.

use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::host::RenderState;

/// Load timing of one listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    /// Resolved source, empty when the listener has none.
    pub resource: String,
    pub state: RenderState,
    /// Seconds from primary fetch start to completion; 0 unless loaded by fetch.
    pub elapsed_seconds: f64,
}

/// Manager-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ManagerStats {
    pub listeners: usize,
    pub loaded: usize,
    pub errored: usize,
    pub pending: usize,
    pub targets: usize,
    pub passes: u64,
    pub fetches_started: u64,
    pub cache_hits: u64,
    pub cache_entries: usize,
    pub cache_capacity: usize,
    pub cache_evictions: u64,
}

impl ManagerStats {
    pub(crate) fn with_cache(mut self, cache: CacheStats) -> Self {
        self.cache_entries = cache.entries;
        self.cache_capacity = cache.capacity;
        self.cache_evictions = cache.evictions;
        self
    }
}

/// Summary of a performance report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub loaded: usize,
    pub errored: usize,
    pub loading: usize,
    /// Mean elapsed seconds across fetched loads.
    pub mean_elapsed_seconds: f64,
}

impl ReportSummary {
    pub fn from_entries(entries: &[PerformanceEntry]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            ..Self::default()
        };
        let mut timed = 0usize;
        let mut elapsed = 0.0;

        for entry in entries {
            match entry.state {
                RenderState::Loaded => summary.loaded += 1,
                RenderState::Error => summary.errored += 1,
                RenderState::Loading => summary.loading += 1,
            }
            if entry.elapsed_seconds > 0.0 {
                timed += 1;
                elapsed += entry.elapsed_seconds;
            }
        }

        if timed > 0 {
            summary.mean_elapsed_seconds = elapsed / timed as f64;
        }
        summary
    }
}
