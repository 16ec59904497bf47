//! Membership cache of previously loaded resources.
//!
//! The cache remembers *which* resources have completed loading so a listener
//! bound to an already-seen resource can render immediately without issuing a
//! fetch. It never stores payloads; the host's own HTTP/image cache holds the
//! bytes.

mod fifo;

pub use fifo::{CacheStats, ResourceCache, DEFAULT_CACHE_CAPACITY};
