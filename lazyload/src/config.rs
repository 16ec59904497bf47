//! Engine configuration.
//!
//! [`LazyConfig`] carries every tunable with its default. Hosts can build it
//! in code, load it from the `[lazyload]` section of an INI file, and change
//! it at runtime through a partial [`ConfigUpdate`].
//!
//! # INI Format
//!
//! ```ini
//! [lazyload]
//! preload_factor = 1.3
//! preload_top_offset = 0
//! poll_interval_ms = 200
//! max_attempts = 3
//! cache_capacity = 200
//! mode = polling
//! listen_events = scroll, resize, touchmove
//! silent = true
//! dispatch_event = false
//! observer_threshold = 0
//! observer_root_margin = 0px 0px 300px 0px
//! placeholder = /img/loading.gif
//! error = /img/broken.png
//! device_pixel_ratio = 2
//! ```

use std::path::Path;
use std::time::Duration;

use ini::Ini;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::ConfigError;
use crate::geometry::{PreloadZone, RootMargin, Viewport};
use crate::host::ObserverInit;
use crate::visibility::Mode;

// ==================== Defaults ====================

/// 1×1 transparent GIF shown when no placeholder or error resource is set.
pub const DEFAULT_RESOURCE: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

/// Default preload zone as a multiple of the viewport.
pub const DEFAULT_PRELOAD_FACTOR: f64 = 1.3;

/// Default upper edge of the preload zone in pixels.
pub const DEFAULT_PRELOAD_TOP_OFFSET: f64 = 0.0;

/// Default minimum interval between polling passes in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Default number of fetch attempts before a listener gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default intersection threshold.
pub const DEFAULT_OBSERVER_THRESHOLD: f64 = 0.0;

/// Events that trigger a polling pass when no list is configured.
pub const DEFAULT_LISTEN_EVENTS: &[&str] = &[
    "scroll",
    "wheel",
    "mousewheel",
    "resize",
    "animationend",
    "transitionend",
    "touchmove",
];

/// INI section holding the engine settings.
pub const CONFIG_SECTION: &str = "lazyload";

/// Native observer settings.
///
/// With the defaults (no explicit margin, zero threshold) observer mode makes
/// the same eligibility decisions as polling. Setting either field trades
/// that away: an explicit `root_margin` replaces the preload zone and a
/// non-zero `threshold` requires part of the element to be inside it, so
/// switching modes may then change which elements load.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverOptions {
    /// Explicit root margin. When `None` the margin is derived from the
    /// preload zone so the observer agrees with polling.
    pub root_margin: Option<RootMargin>,

    /// Visible fraction at which the observer fires. Non-zero values diverge
    /// from polling.
    pub threshold: f64,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            root_margin: None,
            threshold: DEFAULT_OBSERVER_THRESHOLD,
        }
    }
}

impl ObserverOptions {
    /// Concrete options for the host observer under the given zone/viewport.
    pub fn resolve(&self, zone: &PreloadZone, viewport: &Viewport) -> ObserverInit {
        ObserverInit {
            root_margin: self
                .root_margin
                .unwrap_or_else(|| RootMargin::for_zone(zone, viewport)),
            threshold: self.threshold,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LazyConfig {
    /// Preload zone height/width as a multiple of the viewport (default 1.3).
    pub preload_factor: f64,

    /// Upper edge of the preload zone in pixels (default 0).
    pub preload_top_offset: f64,

    /// Minimum interval between polling passes (default 200ms).
    pub poll_interval: Duration,

    /// Fetch attempts per listener before it becomes terminal (default 3).
    pub max_attempts: u32,

    /// Resource cache capacity (default 200).
    pub cache_capacity: usize,

    /// Requested visibility backend. Observer falls back to polling when the
    /// host lacks support.
    pub mode: Mode,

    /// Events subscribed on every scroll target in polling mode.
    pub listen_events: Vec<String>,

    /// Suppress validation and fetch-failure warnings (logged at debug instead).
    pub silent: bool,

    /// Also emit a platform custom event on each render.
    pub dispatch_platform_event: bool,

    /// Native observer settings.
    pub observer: ObserverOptions,

    /// Placeholder resource used when a descriptor has none.
    pub placeholder: String,

    /// Error resource used when a descriptor has none.
    pub error_resource: String,

    /// Device pixel ratio applied to container widths for `srcset` selection.
    pub device_pixel_ratio: f64,
}

impl Default for LazyConfig {
    fn default() -> Self {
        Self {
            preload_factor: DEFAULT_PRELOAD_FACTOR,
            preload_top_offset: DEFAULT_PRELOAD_TOP_OFFSET,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            mode: Mode::Polling,
            listen_events: DEFAULT_LISTEN_EVENTS.iter().map(|e| e.to_string()).collect(),
            silent: true,
            dispatch_platform_event: false,
            observer: ObserverOptions::default(),
            placeholder: DEFAULT_RESOURCE.to_string(),
            error_resource: DEFAULT_RESOURCE.to_string(),
            device_pixel_ratio: 1.0,
        }
    }
}

impl LazyConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// The preload zone described by this configuration.
    pub fn preload_zone(&self) -> PreloadZone {
        PreloadZone::new(self.preload_factor, self.preload_top_offset)
    }

    pub fn with_preload_factor(mut self, factor: f64) -> Self {
        self.preload_factor = factor;
        self
    }

    pub fn with_preload_top_offset(mut self, offset: f64) -> Self {
        self.preload_top_offset = offset;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the attempt budget. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_listen_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.listen_events = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_dispatch_platform_event(mut self, dispatch: bool) -> Self {
        self.dispatch_platform_event = dispatch;
        self
    }

    pub fn with_observer_options(mut self, observer: ObserverOptions) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_placeholder(mut self, resource: impl Into<String>) -> Self {
        self.placeholder = resource.into();
        self
    }

    pub fn with_error_resource(mut self, resource: impl Into<String>) -> Self {
        self.error_resource = resource.into();
        self
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &ConfigUpdate) {
        if let Some(factor) = update.preload_factor {
            self.preload_factor = factor;
        }
        if let Some(offset) = update.preload_top_offset {
            self.preload_top_offset = offset;
        }
        if let Some(ms) = update.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = update.max_attempts {
            self.max_attempts = attempts.max(1);
        }
        if let Some(capacity) = update.cache_capacity {
            self.cache_capacity = capacity;
        }
        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(ref events) = update.listen_events {
            self.listen_events = events.clone();
        }
        if let Some(silent) = update.silent {
            self.silent = silent;
        }
        if let Some(dispatch) = update.dispatch_platform_event {
            self.dispatch_platform_event = dispatch;
        }
        if let Some(ref observer) = update.observer {
            self.observer = observer.clone();
        }
        if let Some(ref placeholder) = update.placeholder {
            self.placeholder = placeholder.clone();
        }
        if let Some(ref error) = update.error_resource {
            self.error_resource = error.clone();
        }
        if let Some(ratio) = update.device_pixel_ratio {
            self.device_pixel_ratio = ratio;
        }
    }

    /// Load configuration from an INI file.
    ///
    /// Missing keys keep their defaults; a missing `[lazyload]` section yields
    /// the default configuration.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_ini_str(&contents)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();
        if let Some(section) = ini.section(Some(CONFIG_SECTION)) {
            config.apply(&ConfigUpdate::from_pairs(section.iter())?);
        }
        Ok(config)
    }

    /// Render the configuration as a `[lazyload]` INI section.
    pub fn to_ini_string(&self) -> Result<String, ConfigError> {
        let mut ini = Ini::new();
        let mut section = ini.with_section(Some(CONFIG_SECTION));
        section
            .set("preload_factor", self.preload_factor.to_string())
            .set("preload_top_offset", self.preload_top_offset.to_string())
            .set("poll_interval_ms", self.poll_interval.as_millis().to_string())
            .set("max_attempts", self.max_attempts.to_string())
            .set("cache_capacity", self.cache_capacity.to_string())
            .set("mode", self.mode.as_str())
            .set("listen_events", self.listen_events.join(", "))
            .set("silent", self.silent.to_string())
            .set("dispatch_event", self.dispatch_platform_event.to_string())
            .set("observer_threshold", self.observer.threshold.to_string())
            .set("placeholder", self.placeholder.as_str())
            .set("error", self.error_resource.as_str())
            .set("device_pixel_ratio", self.device_pixel_ratio.to_string());
        if let Some(margin) = self.observer.root_margin {
            section.set("observer_root_margin", margin.to_css());
        }

        let mut buf = Vec::new();
        ini.write_to(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Partial configuration change; `None` leaves a setting untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigUpdate {
    pub preload_factor: Option<f64>,
    pub preload_top_offset: Option<f64>,
    pub poll_interval_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub cache_capacity: Option<usize>,
    pub mode: Option<Mode>,
    pub listen_events: Option<Vec<String>>,
    pub silent: Option<bool>,
    pub dispatch_platform_event: Option<bool>,
    pub observer: Option<ObserverOptions>,
    pub placeholder: Option<String>,
    pub error_resource: Option<String>,
    pub device_pixel_ratio: Option<f64>,
}

impl ConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an update from `key = value` pairs, validating each value.
    ///
    /// Unknown keys are logged and ignored.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut update = Self::default();
        let mut threshold = None;
        let mut root_margin = None;

        for (key, raw) in pairs {
            let value = raw.trim();
            match key {
                "preload_factor" => {
                    let factor: f64 = parse_value(key, value)?;
                    if factor <= 0.0 {
                        return Err(invalid(key, value));
                    }
                    update.preload_factor = Some(factor);
                }
                "preload_top_offset" => update.preload_top_offset = Some(parse_value(key, value)?),
                "poll_interval_ms" => update.poll_interval_ms = Some(parse_value(key, value)?),
                "max_attempts" => {
                    let attempts: u32 = parse_value(key, value)?;
                    if attempts == 0 {
                        return Err(invalid(key, value));
                    }
                    update.max_attempts = Some(attempts);
                }
                "cache_capacity" => update.cache_capacity = Some(parse_value(key, value)?),
                "mode" => {
                    update.mode = Some(Mode::from_str_opt(value).ok_or_else(|| invalid(key, value))?)
                }
                "listen_events" => {
                    update.listen_events = Some(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|e| !e.is_empty())
                            .map(str::to_string)
                            .collect(),
                    )
                }
                "silent" => update.silent = Some(parse_bool(key, value)?),
                "dispatch_event" => update.dispatch_platform_event = Some(parse_bool(key, value)?),
                "observer_threshold" => {
                    let t: f64 = parse_value(key, value)?;
                    if !(0.0..=1.0).contains(&t) {
                        return Err(invalid(key, value));
                    }
                    threshold = Some(t);
                }
                "observer_root_margin" => root_margin = Some(parse_root_margin(key, value)?),
                "placeholder" => update.placeholder = Some(value.to_string()),
                "error" => update.error_resource = Some(value.to_string()),
                "device_pixel_ratio" => update.device_pixel_ratio = Some(parse_value(key, value)?),
                other => {
                    tracing::warn!(key = %other, "Ignoring unknown lazyload config key");
                }
            }
        }

        if threshold.is_some() || root_margin.is_some() {
            update.observer = Some(ObserverOptions {
                root_margin,
                threshold: threshold.unwrap_or(DEFAULT_OBSERVER_THRESHOLD),
            });
        }

        Ok(update)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

/// Parse a CSS-style margin: one, two or four pixel lengths.
fn parse_root_margin(key: &str, value: &str) -> Result<RootMargin, ConfigError> {
    let parts = value
        .split_whitespace()
        .map(|p| p.trim_end_matches("px").parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid(key, value))?;

    match parts.as_slice() {
        [all] => Ok(RootMargin {
            top: *all,
            right: *all,
            bottom: *all,
            left: *all,
        }),
        [vertical, horizontal] => Ok(RootMargin {
            top: *vertical,
            right: *horizontal,
            bottom: *vertical,
            left: *horizontal,
        }),
        [top, right, bottom, left] => Ok(RootMargin {
            top: *top,
            right: *right,
            bottom: *bottom,
            left: *left,
        }),
        _ => Err(invalid(key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LazyConfig::default();
        assert_eq!(config.preload_factor, 1.3);
        assert_eq!(config.preload_top_offset, 0.0);
        assert_eq!(config.poll_interval, Duration::from_millis(200));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.cache_capacity, 200);
        assert_eq!(config.mode, Mode::Polling);
        assert_eq!(config.listen_events.len(), DEFAULT_LISTEN_EVENTS.len());
        assert!(config.silent);
        assert!(!config.dispatch_platform_event);
        assert_eq!(config.placeholder, DEFAULT_RESOURCE);
    }

    #[test]
    fn test_builder() {
        let config = LazyConfig::new()
            .with_preload_factor(2.0)
            .with_max_attempts(0)
            .with_mode(Mode::Observer)
            .with_listen_events(["scroll"]);

        assert_eq!(config.preload_factor, 2.0);
        assert_eq!(config.max_attempts, 1, "attempt budget is at least one");
        assert_eq!(config.mode, Mode::Observer);
        assert_eq!(config.listen_events, vec!["scroll".to_string()]);
    }

    #[test]
    fn test_apply_partial_update() {
        let mut config = LazyConfig::default();
        let update = ConfigUpdate {
            cache_capacity: Some(10),
            silent: Some(false),
            ..Default::default()
        };

        config.apply(&update);

        assert_eq!(config.cache_capacity, 10);
        assert!(!config.silent);
        assert_eq!(config.preload_factor, DEFAULT_PRELOAD_FACTOR);
    }

    #[test]
    fn test_ini_output_reloads() {
        let config = LazyConfig::new()
            .with_preload_factor(1.5)
            .with_poll_interval(Duration::from_millis(50))
            .with_mode(Mode::Observer)
            .with_listen_events(["scroll", "resize"])
            .with_placeholder("/img/loading.gif")
            .with_error_resource("/img/broken.png");

        let text = config.to_ini_string().unwrap();

        assert!(text.contains("[lazyload]"));
        assert_eq!(LazyConfig::from_ini_str(&text).unwrap(), config);
    }

    #[test]
    fn test_from_ini_str() {
        let config = LazyConfig::from_ini_str(
            "[lazyload]\n\
             preload_factor = 2\n\
             poll_interval_ms = 50\n\
             mode = observer\n\
             listen_events = scroll, resize\n\
             silent = no\n\
             observer_root_margin = 0px 0px 100px 0px\n",
        )
        .unwrap();

        assert_eq!(config.preload_factor, 2.0);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.mode, Mode::Observer);
        assert_eq!(config.listen_events, vec!["scroll", "resize"]);
        assert!(!config.silent);
        let margin = config.observer.root_margin.unwrap();
        assert_eq!(margin.bottom, 100.0);
    }

    #[test]
    fn test_from_ini_without_section_is_default() {
        let config = LazyConfig::from_ini_str("[other]\nkey = value\n").unwrap();
        assert_eq!(config, LazyConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = LazyConfig::from_ini_str("[lazyload]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "max_attempts"));

        let err = LazyConfig::from_ini_str("[lazyload]\nmode = sideways\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = LazyConfig::from_ini_str("[lazyload]\npreload_factor = -1\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_from_ini_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[lazyload]\ncache_capacity = 16\n").unwrap();

        let config = LazyConfig::from_ini_file(file.path()).unwrap();

        assert_eq!(config.cache_capacity, 16);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = LazyConfig::from_ini_file("/nonexistent/lazyload.ini").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_root_margin_shorthand() {
        let margin = parse_root_margin("m", "10px 20px").unwrap();
        assert_eq!(margin.top, 10.0);
        assert_eq!(margin.right, 20.0);
        assert_eq!(margin.bottom, 10.0);
        assert_eq!(margin.left, 20.0);

        assert!(parse_root_margin("m", "1px 2px 3px").is_err());
    }

    #[test]
    fn test_observer_options_derive_margin_from_zone() {
        let zone = PreloadZone::new(1.5, 0.0);
        let viewport = Viewport::new(400.0, 1000.0);
        let init = ObserverOptions::default().resolve(&zone, &viewport);
        assert_eq!(init.root_margin.bottom, 500.0);
        assert_eq!(init.root_margin.right, 200.0);
    }
}
