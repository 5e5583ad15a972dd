//! Cache-related MCP tools.
//!
//! This module provides tools for reading and sweeping the result and
//! snapshot caches.

pub mod cleanup;
pub mod get;
pub mod snapshot;

pub use cleanup::{CacheCleanupParams, cleanup_impl};
pub use get::{CacheGetParams, get_impl};
pub use snapshot::{SnapshotGetParams, snapshot_get_impl};
