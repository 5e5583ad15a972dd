//! Result cache for expensive extraction and analysis work.
//!
//! Every store call goes through the retry executor. Reads fail open: a store
//! failure is logged and treated as a miss so the caller recomputes. Writes
//! are best-effort: failures are logged and counted, never returned.
//!
//! ### Invariants
//! - `created_at` is set by the first write and never changed (TTL anchoring).
//! - Content is last-write-wins.
//! - Concurrent writers for the same hash are not de-duplicated.

use std::sync::Arc;

use chrono::{Duration, Utc};

use super::connection::CacheDb;
pub use super::ocr::{CacheWrite, CachedResult};
use crate::Error;
use crate::metrics::{Counter, Metrics};
use crate::payload::AnalysisPayload;
use crate::retry::{RetryOutcome, RetryPolicy, RetryStop, with_retry};

/// True when the record carries a successful analysis.
pub fn has_completed_analysis(record: &CachedResult) -> bool {
    record.analysis.as_ref().is_some_and(AnalysisPayload::is_success)
}

/// True when a draft is cached but no analysis has been stored yet.
///
/// Such entries need confirmation or re-analysis.
pub fn has_draft_only(record: &CachedResult) -> bool {
    record.parsed_ingredients.is_some() && record.analysis.is_none()
}

/// Result cache with retry, fail-open reads and best-effort writes.
#[derive(Debug, Clone)]
pub struct ResultCache {
    db: CacheDb,
    policy: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl ResultCache {
    pub fn new(db: CacheDb, policy: RetryPolicy, metrics: Arc<Metrics>) -> Self {
        Self { db, policy, metrics }
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Use a different retry policy for calls made through the returned handle.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self { policy, ..self.clone() }
    }

    fn record_retries<T>(&self, outcome: &RetryOutcome<T, Error>) {
        self.metrics.add(Counter::RetryAttempt, u64::from(outcome.retries()));
        if outcome.stop == RetryStop::Exhausted {
            self.metrics.incr(Counter::RetryExhausted);
        }
    }

    /// Look up a cached result.
    ///
    /// A missing row and a failed read both return `None`; only the latter is
    /// logged.
    pub async fn get(&self, image_hash: &str) -> Option<CachedResult> {
        let outcome = with_retry(&self.policy, || {
            let db = self.db.clone();
            let hash = image_hash.to_string();
            async move { db.get_cached_result(&hash).await }
        })
        .await;
        self.record_retries(&outcome);

        match outcome.result {
            Ok(Some(record)) => {
                self.metrics.incr(Counter::CacheHit);
                Some(record)
            }
            Ok(None) => {
                self.metrics.incr(Counter::CacheMiss);
                None
            }
            Err(e) => {
                self.metrics.incr(Counter::CacheReadError);
                tracing::warn!(
                    image_hash,
                    attempts = outcome.attempts,
                    status = ?outcome.status,
                    error = %e,
                    "result cache read failed; treating as miss"
                );
                None
            }
        }
    }

    /// Upsert a result. Returns whether the write was persisted.
    pub async fn set(&self, image_hash: &str, write: &CacheWrite) -> bool {
        let outcome = with_retry(&self.policy, || {
            let db = self.db.clone();
            let hash = image_hash.to_string();
            let write = write.clone();
            async move { db.upsert_cached_result(&hash, &write, Utc::now()).await }
        })
        .await;
        self.record_retries(&outcome);

        match outcome.result {
            Ok(()) => {
                self.metrics.incr(Counter::CacheWrite);
                tracing::debug!(image_hash, attempts = outcome.attempts, "result cached");
                true
            }
            Err(e) => {
                self.metrics.incr(Counter::CacheWriteError);
                tracing::warn!(
                    image_hash,
                    attempts = outcome.attempts,
                    status = ?outcome.status,
                    trace_id = outcome.trace_id.as_deref().unwrap_or("-"),
                    error = %e,
                    "result cache write failed"
                );
                false
            }
        }
    }

    /// Store a completed analysis on an existing entry, leaving the draft untouched.
    ///
    /// Returns whether a row was updated.
    pub async fn update_analysis(&self, image_hash: &str, analysis: &AnalysisPayload) -> bool {
        let outcome = with_retry(&self.policy, || {
            let db = self.db.clone();
            let hash = image_hash.to_string();
            let analysis = analysis.clone();
            async move { db.update_cached_analysis(&hash, &analysis).await }
        })
        .await;
        self.record_retries(&outcome);

        match outcome.result {
            Ok(true) => {
                self.metrics.incr(Counter::AnalysisUpdate);
                true
            }
            Ok(false) => {
                tracing::debug!(image_hash, "no cached entry to attach analysis to");
                false
            }
            Err(e) => {
                self.metrics.incr(Counter::CacheWriteError);
                tracing::warn!(image_hash, attempts = outcome.attempts, error = %e, "analysis update failed");
                false
            }
        }
    }

    /// Delete entries first written more than `ttl_days` ago.
    ///
    /// Returns the number deleted. A failed sweep returns 0 and is left for
    /// the next scheduled run.
    pub async fn cleanup_expired(&self, ttl_days: u32) -> u64 {
        let Some(cutoff) = Duration::try_days(i64::from(ttl_days)).and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            tracing::debug!(ttl_days, "ttl reaches past the earliest representable time; nothing to delete");
            return 0;
        };
        let outcome = with_retry(&self.policy, || {
            let db = self.db.clone();
            async move { db.delete_cached_results_before(cutoff).await }
        })
        .await;
        self.record_retries(&outcome);

        match outcome.result {
            Ok(deleted) => {
                self.metrics.add(Counter::CleanupDeleted, deleted);
                tracing::info!(deleted, ttl_days, "result cache cleanup complete");
                deleted
            }
            Err(e) => {
                self.metrics.incr(Counter::CleanupError);
                tracing::warn!(ttl_days, attempts = outcome.attempts, error = %e, "result cache cleanup failed");
                0
            }
        }
    }
}
