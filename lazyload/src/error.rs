//! Error types for the lazy loading engine.
//!
//! Errors never escape a scheduling pass. Fetch failures are folded into the
//! listener state machine and surfaced through the event bus; the types here
//! exist for the fetcher seam, configuration loading and manager construction.

use thiserror::Error;

/// Failure to fetch a resource.
///
/// Every variant is retryable until the listener exhausts its attempt budget.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The listener has no resource to fetch.
    #[error("resource source is required")]
    MissingSource,

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Connection, timeout or transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// The payload arrived but could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Configuration could not be loaded or contains an invalid value.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid INI.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A key holds a value of the wrong shape or out of range.
    #[error("Invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },
}

/// Errors surfaced when constructing or configuring a manager.
#[derive(Debug, Error)]
pub enum LazyError {
    /// The manager was built outside a Tokio runtime and no handle was given.
    #[error("No Tokio runtime available to run fetch tasks")]
    NoRuntime,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
