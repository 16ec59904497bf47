//! What the binding layer hands over for each element.

use serde::{Deserialize, Serialize};

use super::filter::SourceFilters;
use super::srcset::select_from_srcset;
use crate::config::LazyConfig;

/// Binding-time description of an element's resources.
///
/// Only `source` is required for loading to happen; a descriptor without one
/// still creates a listener, which then stays pending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Descriptor {
    pub source: Option<String>,
    pub placeholder: Option<String>,
    pub error: Option<String>,
    /// Responsive candidates; when present they take precedence over `source`.
    pub srcset: Option<String>,
    /// Ref name or element id of the scroll container to watch.
    pub container_hint: Option<String>,
    /// Style property to set instead of the element's source attribute.
    pub bind_target: Option<String>,
}

impl Descriptor {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    /// A descriptor with no source.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_srcset(mut self, srcset: impl Into<String>) -> Self {
        self.srcset = Some(srcset.into());
        self
    }

    pub fn with_container_hint(mut self, hint: impl Into<String>) -> Self {
        self.container_hint = Some(hint.into());
        self
    }

    pub fn with_bind_target(mut self, property: impl Into<String>) -> Self {
        self.bind_target = Some(property.into());
        self
    }

    /// Resolve the three resources for this descriptor.
    ///
    /// `container_width` is the layout width of the element's container in
    /// CSS pixels; it is scaled by the configured device pixel ratio before
    /// `srcset` selection.
    pub fn resolve(
        &self,
        config: &LazyConfig,
        container_width: Option<f64>,
        filters: &SourceFilters,
    ) -> ResolvedSources {
        let from_srcset = self.srcset.as_deref().and_then(|srcset| {
            select_from_srcset(
                srcset,
                container_width.unwrap_or(0.0) * config.device_pixel_ratio,
            )
        });

        let mut sources = ResolvedSources {
            source: from_srcset.or_else(|| self.source.clone()).filter(|s| !s.is_empty()),
            placeholder: self
                .placeholder
                .clone()
                .unwrap_or_else(|| config.placeholder.clone()),
            error_resource: self
                .error
                .clone()
                .unwrap_or_else(|| config.error_resource.clone()),
        };

        filters.apply(&mut sources);
        sources
    }
}

/// Resources a listener works with after defaults, `srcset` and filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSources {
    pub source: Option<String>,
    pub placeholder: String,
    pub error_resource: String,
}

impl ResolvedSources {
    /// Sources with the default placeholder and error resource.
    pub fn new(source: Option<String>) -> Self {
        Self {
            source,
            placeholder: crate::config::DEFAULT_RESOURCE.to_string(),
            error_resource: crate::config::DEFAULT_RESOURCE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_RESOURCE;
    use crate::listener::CdnSuffixFilter;
    use std::sync::Arc;

    #[test]
    fn test_defaults_fill_missing_resources() {
        let resolved = Descriptor::new("a.png").resolve(&LazyConfig::default(), None, &SourceFilters::new());

        assert_eq!(resolved.source.as_deref(), Some("a.png"));
        assert_eq!(resolved.placeholder, DEFAULT_RESOURCE);
        assert_eq!(resolved.error_resource, DEFAULT_RESOURCE);
    }

    #[test]
    fn test_explicit_resources_win() {
        let config = LazyConfig::default().with_placeholder("spinner.gif");
        let resolved = Descriptor::new("a.png")
            .with_error("broken.png")
            .resolve(&config, None, &SourceFilters::new());

        assert_eq!(resolved.placeholder, "spinner.gif");
        assert_eq!(resolved.error_resource, "broken.png");
    }

    #[test]
    fn test_empty_source_counts_as_missing() {
        let resolved = Descriptor::new("").resolve(&LazyConfig::default(), None, &SourceFilters::new());
        assert_eq!(resolved.source, None);
    }

    #[test]
    fn test_srcset_uses_scaled_container_width() {
        let descriptor = Descriptor::new("fallback.jpg").with_srcset("big.jpg 1000w, small.jpg 400w");
        let filters = SourceFilters::new();

        let one_x = descriptor.resolve(&LazyConfig::default(), Some(300.0), &filters);
        assert_eq!(one_x.source.as_deref(), Some("small.jpg"));

        let config = LazyConfig::default().with_device_pixel_ratio(2.0);
        let two_x = descriptor.resolve(&config, Some(300.0), &filters);
        assert_eq!(two_x.source.as_deref(), Some("big.jpg"));
    }

    #[test]
    fn test_filters_see_srcset_choice() {
        let mut filters = SourceFilters::new();
        filters.push(Arc::new(CdnSuffixFilter::new(".jpg", "?q=80")));
        let resolved = Descriptor::empty()
            .with_srcset("only.jpg 100w")
            .resolve(&LazyConfig::default(), Some(50.0), &filters);

        assert_eq!(resolved.source.as_deref(), Some("only.jpg?q=80"));
    }
}
