//! SQLite-backed caches for extraction results and product snapshots.
//!
//! This module provides persistent, content-addressed caches using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Result cache keyed by image fingerprint, with TTL anchored to first write
//! - Snapshot cache keyed by `(key, source)` with lazy expiry
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Retry on transient store failures, fail-open reads

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod ocr;
pub mod results;
pub mod snapshots;

use chrono::{DateTime, SecondsFormat, Utc};

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::{compute_image_hash, snapshot_id};
pub use ocr::CachedResult;
pub use results::{CacheWrite, ResultCache, has_completed_analysis, has_draft_only};
pub use snapshots::{FieldUpdate, SnapshotCache, SnapshotRecord, SnapshotWrite};

/// Format a timestamp for storage.
///
/// Fixed-width UTC with microseconds so that lexicographic order in SQL
/// matches chronological order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("invalid timestamp {raw:?}: {e}")))
}
