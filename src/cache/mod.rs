//! Generic caching layer for data persistence and offline support.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Shadows a partitioned SQLite store with process-lifetime memory maps
//! - Judges staleness from write timestamps against a configurable window
//! - Resolves keys through an ordered chain of cache levels, the network
//!   and a synthesized placeholder
//! - Serves stale data when the network is unavailable

mod layer;
mod memory;
mod storage;
mod traits;

pub use layer::{CacheLayer, Fetched, Target};
pub use memory::MemoryMap;
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, Cacheable, Lookup, Partition};
