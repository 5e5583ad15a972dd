//! Counters for cache, retry and search outcomes.
//!
//! A `Metrics` registry is created once by the owner of the pipeline and
//! shared (via `Arc`) with the caches and the search pipeline. Each counter
//! keeps a rolling window, reset on every flush, and a lifetime total.
//!
//! The periodic flush task is started explicitly with [`Metrics::start_flusher`]
//! and stopped with [`Metrics::stop_flusher`]. Starting twice is a no-op.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Default flush cadence.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

const COUNTER_COUNT: usize = 14;

/// Named counters tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    CacheHit,
    CacheMiss,
    CacheReadError,
    CacheWrite,
    CacheWriteError,
    AnalysisUpdate,
    CleanupDeleted,
    CleanupError,
    RetryAttempt,
    RetryExhausted,
    SchemaFallback,
    SearchRequest,
    SearchError,
    SearchFallback,
}

impl Counter {
    pub const ALL: [Counter; COUNTER_COUNT] = [
        Counter::CacheHit,
        Counter::CacheMiss,
        Counter::CacheReadError,
        Counter::CacheWrite,
        Counter::CacheWriteError,
        Counter::AnalysisUpdate,
        Counter::CleanupDeleted,
        Counter::CleanupError,
        Counter::RetryAttempt,
        Counter::RetryExhausted,
        Counter::SchemaFallback,
        Counter::SearchRequest,
        Counter::SearchError,
        Counter::SearchFallback,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Counter::CacheHit => "cache_hit",
            Counter::CacheMiss => "cache_miss",
            Counter::CacheReadError => "cache_read_error",
            Counter::CacheWrite => "cache_write",
            Counter::CacheWriteError => "cache_write_error",
            Counter::AnalysisUpdate => "analysis_update",
            Counter::CleanupDeleted => "cleanup_deleted",
            Counter::CleanupError => "cleanup_error",
            Counter::RetryAttempt => "retry_attempt",
            Counter::RetryExhausted => "retry_exhausted",
            Counter::SchemaFallback => "schema_fallback",
            Counter::SearchRequest => "search_request",
            Counter::SearchError => "search_error",
            Counter::SearchFallback => "search_fallback",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct MetricsSnapshot {
    /// Counts since the last flush.
    pub window: BTreeMap<String, u64>,
    /// Counts since the registry was created.
    pub totals: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn window(&self, counter: Counter) -> u64 {
        self.window.get(counter.name()).copied().unwrap_or(0)
    }

    pub fn total(&self, counter: Counter) -> u64 {
        self.totals.get(counter.name()).copied().unwrap_or(0)
    }
}

/// Process-wide counter registry with an explicit flush lifecycle.
#[derive(Debug)]
pub struct Metrics {
    window: [AtomicU64; COUNTER_COUNT],
    totals: [AtomicU64; COUNTER_COUNT],
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            window: std::array::from_fn(|_| AtomicU64::new(0)),
            totals: std::array::from_fn(|_| AtomicU64::new(0)),
            flusher: Mutex::new(None),
        }
    }
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, n: u64) {
        if n == 0 {
            return;
        }
        self.window[counter.index()].fetch_add(n, Ordering::Relaxed);
        self.totals[counter.index()].fetch_add(n, Ordering::Relaxed);
    }

    /// Read all counters without resetting anything.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();
        for counter in Counter::ALL {
            let name = counter.name().to_string();
            snapshot
                .window
                .insert(name.clone(), self.window[counter.index()].load(Ordering::Relaxed));
            snapshot
                .totals
                .insert(name, self.totals[counter.index()].load(Ordering::Relaxed));
        }
        snapshot
    }

    /// Emit the current window, then reset it. Lifetime totals are kept.
    pub fn flush(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();
        for counter in Counter::ALL {
            let name = counter.name().to_string();
            let windowed = self.window[counter.index()].swap(0, Ordering::Relaxed);
            snapshot.window.insert(name.clone(), windowed);
            snapshot
                .totals
                .insert(name, self.totals[counter.index()].load(Ordering::Relaxed));
        }

        tracing::info!(window = ?snapshot.window, "metrics window flushed");

        snapshot
    }

    /// Start the periodic flush task.
    ///
    /// Returns `false` if a flusher is already running for this registry.
    /// Must be called from within a tokio runtime.
    pub fn start_flusher(self: &Arc<Self>, interval: Duration) -> bool {
        let mut guard = self.flusher.lock().unwrap_or_else(|e| e.into_inner());
        if guard.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(metrics) => {
                        metrics.flush();
                    }
                    None => break,
                }
            }
        });

        tracing::debug!(interval_secs = interval.as_secs(), "metrics flusher started");
        *guard = Some(handle);
        true
    }

    /// Stop the periodic flush task. Returns `false` if none was running.
    pub fn stop_flusher(&self) -> bool {
        let handle = self.flusher.lock().unwrap_or_else(|e| e.into_inner()).take();
        match handle {
            Some(handle) => {
                handle.abort();
                tracing::debug!("metrics flusher stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_flushing(&self) -> bool {
        self.flusher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
