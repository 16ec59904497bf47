//! Source rewriting filters.
//!
//! Filters run, in registration order, every time a descriptor is resolved:
//! on bind and on every update. They may rewrite any of the three resources.

use std::fmt;
use std::sync::Arc;

use super::ResolvedSources;

/// Rewrites a listener's resources before they are used.
pub trait SourceFilter: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "custom"
    }

    fn apply(&self, sources: &mut ResolvedSources);
}

impl<F> SourceFilter for F
where
    F: Fn(&mut ResolvedSources) + Send + Sync,
{
    fn apply(&self, sources: &mut ResolvedSources) {
        self(sources)
    }
}

/// Appends a query suffix to sources served from a matching host.
///
/// ```
/// use lazyload::listener::{CdnSuffixFilter, ResolvedSources, SourceFilter};
///
/// let filter = CdnSuffixFilter::new("cdn.example.com", "?format=webp");
/// let mut sources = ResolvedSources::new(Some("https://cdn.example.com/a.jpg".into()));
/// filter.apply(&mut sources);
/// assert_eq!(sources.source.as_deref(), Some("https://cdn.example.com/a.jpg?format=webp"));
/// ```
#[derive(Debug, Clone)]
pub struct CdnSuffixFilter {
    host: String,
    suffix: String,
}

impl CdnSuffixFilter {
    pub fn new(host: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            suffix: suffix.into(),
        }
    }
}

impl SourceFilter for CdnSuffixFilter {
    fn name(&self) -> &str {
        "cdn-suffix"
    }

    fn apply(&self, sources: &mut ResolvedSources) {
        if let Some(source) = sources.source.as_mut() {
            if source.contains(&self.host) && !source.ends_with(&self.suffix) {
                source.push_str(&self.suffix);
            }
        }
    }
}

/// Ordered filter chain shared by every listener of a manager.
#[derive(Clone, Default)]
pub struct SourceFilters {
    filters: Vec<Arc<dyn SourceFilter>>,
}

impl SourceFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Arc<dyn SourceFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run every filter over `sources`.
    pub fn apply(&self, sources: &mut ResolvedSources) {
        for filter in &self.filters {
            filter.apply(sources);
            tracing::trace!(filter = filter.name(), source = ?sources.source, "Applied source filter");
        }
    }
}

impl fmt::Debug for SourceFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}
