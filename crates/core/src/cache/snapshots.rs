//! Product snapshot cache.
//!
//! Snapshots are keyed by `(key, source)` and carry an optional absolute
//! expiry. Expiry is lazy: a read resolves the most recent row first and
//! reports nothing if that row's `expires_at` has passed. An older row is
//! never served in place of an expired newer one.
//! [`SnapshotCache::purge_expired`] removes expired rows physically.
//!
//! ### Ordering
//! When several rows exist for one `(key, source)`, the most recent wins by
//! `updated_at`. Stores created before that column existed report
//! [`Error::SchemaDrift`]; the read is then repeated ordered by `created_at`.
//!
//! ### Partial updates
//! `expires_at` and `analysis` are [`FieldUpdate`]s: a write can leave the
//! stored value alone, clear it, or replace it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::{format_timestamp, hash::snapshot_id};
use crate::Error;
use crate::metrics::{Counter, Metrics};
use crate::payload::{AnalysisPayload, SnapshotPayload, SnapshotSource};
use crate::retry::{RetryOutcome, RetryPolicy, RetryStop, with_retry};

/// A stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SnapshotRecord {
    pub id: String,
    pub key: String,
    pub source: SnapshotSource,
    pub payload: SnapshotPayload,
    pub analysis: Option<AnalysisPayload>,
    pub created_at: String,
    /// Absent on stores that predate the column.
    pub updated_at: Option<String>,
    pub expires_at: Option<String>,
}

/// How a write treats an optional stored field.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldUpdate<T> {
    /// Keep whatever is stored (NULL on insert).
    #[default]
    Unchanged,
    /// Store NULL.
    Clear,
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, FieldUpdate::Unchanged)
    }

    fn try_map<U, E>(&self, f: impl FnOnce(&T) -> Result<U, E>) -> Result<FieldUpdate<U>, E> {
        Ok(match self {
            FieldUpdate::Unchanged => FieldUpdate::Unchanged,
            FieldUpdate::Clear => FieldUpdate::Clear,
            FieldUpdate::Set(v) => FieldUpdate::Set(f(v)?),
        })
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    /// `Some` sets the field and `None` clears it.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => FieldUpdate::Set(v),
            None => FieldUpdate::Clear,
        }
    }
}

/// A snapshot write.
#[derive(Debug, Clone)]
pub struct SnapshotWrite {
    /// Row id. Defaults to [`snapshot_id`] of `(key, source)`.
    pub id: Option<String>,
    pub key: String,
    pub source: SnapshotSource,
    pub payload: SnapshotPayload,
    /// Defaults to the time of the write.
    pub updated_at: Option<DateTime<Utc>>,
    pub expires_at: FieldUpdate<DateTime<Utc>>,
    pub analysis: FieldUpdate<AnalysisPayload>,
}

impl SnapshotWrite {
    pub fn new(key: impl Into<String>, source: SnapshotSource, payload: SnapshotPayload) -> Self {
        Self {
            id: None,
            key: key.into(),
            source,
            payload,
            updated_at: None,
            expires_at: FieldUpdate::Unchanged,
            analysis: FieldUpdate::Unchanged,
        }
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = FieldUpdate::Set(at);
        self
    }

    pub fn analysis(mut self, analysis: FieldUpdate<AnalysisPayload>) -> Self {
        self.analysis = analysis;
        self
    }

    fn row_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| snapshot_id(&self.key, self.source))
    }
}

/// Column the latest-row query orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyColumn {
    UpdatedAt,
    CreatedAt,
}

impl RecencyColumn {
    fn as_str(self) -> &'static str {
        match self {
            RecencyColumn::UpdatedAt => "updated_at",
            RecencyColumn::CreatedAt => "created_at",
        }
    }
}

struct RawSnapshot {
    id: String,
    key: String,
    source: String,
    payload_json: String,
    analysis_json: Option<String>,
    created_at: String,
    updated_at: Option<String>,
    expires_at: Option<String>,
}

impl RawSnapshot {
    fn decode(self) -> Result<SnapshotRecord, Error> {
        Ok(SnapshotRecord {
            id: self.id,
            key: self.key,
            source: self.source.parse()?,
            payload: SnapshotPayload::from_json(&self.payload_json)?,
            analysis: self.analysis_json.as_deref().map(serde_json::from_str).transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
        })
    }
}

impl CacheDb {
    /// Most recent snapshot for `(key, source)`, ordered by `order_by`.
    ///
    /// Returns `None` when that row has expired at `now`. A missing ordering
    /// column surfaces as [`Error::SchemaDrift`].
    pub async fn latest_snapshot(
        &self, key: &str, source: SnapshotSource, order_by: RecencyColumn, now: DateTime<Utc>,
    ) -> Result<Option<SnapshotRecord>, Error> {
        let key = key.to_string();
        let now = format_timestamp(now);
        let updated_col = match order_by {
            RecencyColumn::UpdatedAt => "updated_at",
            RecencyColumn::CreatedAt => "NULL",
        };
        let sql = format!(
            "SELECT id, key, source, payload_json, analysis_json, created_at, {updated_col}, expires_at
             FROM snapshots
             WHERE key = ?1 AND source = ?2
             ORDER BY {} DESC LIMIT 1",
            order_by.as_str()
        );

        let row = self
            .conn
            .call(move |conn| -> Result<Option<RawSnapshot>, Error> {
                let mut stmt = conn.prepare(&sql).map_err(Error::classify_sqlite)?;
                let result = stmt.query_row(params![key, source.as_str()], |row| {
                    Ok(RawSnapshot {
                        id: row.get(0)?,
                        key: row.get(1)?,
                        source: row.get(2)?,
                        payload_json: row.get(3)?,
                        analysis_json: row.get(4)?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                        expires_at: row.get(7)?,
                    })
                });

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(Error::classify_sqlite(e)),
                }
            })
            .await
            .map_err(Error::from)?;

        match row {
            Some(raw) if raw.expires_at.as_deref().is_some_and(|at| at <= now.as_str()) => Ok(None),
            Some(raw) => raw.decode().map(Some),
            None => Ok(None),
        }
    }

    /// Insert or update a snapshot by id.
    ///
    /// Fields left [`FieldUpdate::Unchanged`] are absent from both the insert
    /// column list and the update set. `created_at` is only written on insert.
    pub async fn upsert_snapshot(&self, write: &SnapshotWrite, now: DateTime<Utc>) -> Result<(), Error> {
        let mut columns = vec!["id", "key", "source", "payload_json", "created_at", "updated_at"];
        let mut values: Vec<Option<String>> = vec![
            Some(write.row_id()),
            Some(write.key.clone()),
            Some(write.source.as_str().to_string()),
            Some(serde_json::to_string(&write.payload)?),
            Some(format_timestamp(now)),
            Some(format_timestamp(write.updated_at.unwrap_or(now))),
        ];
        let mut updates = vec!["key", "source", "payload_json", "updated_at"];

        let expires_at = write.expires_at.try_map(|at| Ok::<_, Error>(format_timestamp(*at)))?;
        let analysis = write.analysis.try_map(serde_json::to_string)?;
        for (column, update) in [("expires_at", expires_at), ("analysis_json", analysis)] {
            match update {
                FieldUpdate::Unchanged => {}
                FieldUpdate::Clear => {
                    columns.push(column);
                    values.push(None);
                    updates.push(column);
                }
                FieldUpdate::Set(v) => {
                    columns.push(column);
                    values.push(Some(v));
                    updates.push(column);
                }
            }
        }

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let set_clause: Vec<String> = updates.iter().map(|c| format!("{c} = excluded.{c}")).collect();
        let sql = format!(
            "INSERT INTO snapshots ({}) VALUES ({})
             ON CONFLICT(id) DO UPDATE SET {}",
            columns.join(", "),
            placeholders.join(", "),
            set_clause.join(", ")
        );

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(&sql, rusqlite::params_from_iter(values.iter()))
                    .map_err(Error::classify_sqlite)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete snapshots whose `expires_at` is before `now`.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_snapshots(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let now = format_timestamp(now);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM snapshots WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

/// Snapshot cache with retry, fail-open reads and best-effort writes.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    db: CacheDb,
    policy: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl SnapshotCache {
    pub fn new(db: CacheDb, policy: RetryPolicy, metrics: Arc<Metrics>) -> Self {
        Self { db, policy, metrics }
    }

    fn record_retries<T>(&self, outcome: &RetryOutcome<T, Error>) {
        self.metrics.add(Counter::RetryAttempt, u64::from(outcome.retries()));
        if outcome.stop == RetryStop::Exhausted {
            self.metrics.incr(Counter::RetryExhausted);
        }
    }

    async fn latest(&self, key: &str, source: SnapshotSource, order_by: RecencyColumn) -> RetryOutcome<Option<SnapshotRecord>, Error> {
        let outcome = with_retry(&self.policy, || {
            let db = self.db.clone();
            let key = key.to_string();
            async move { db.latest_snapshot(&key, source, order_by, Utc::now()).await }
        })
        .await;
        self.record_retries(&outcome);
        outcome
    }

    /// Most recent unexpired snapshot for `(key, source)`.
    ///
    /// Returns `None` for a miss and for a failed read.
    pub async fn get(&self, key: &str, source: SnapshotSource) -> Option<SnapshotRecord> {
        let mut outcome = self.latest(key, source, RecencyColumn::UpdatedAt).await;

        if let Err(Error::SchemaDrift { column }) = &outcome.result {
            tracing::debug!(key, %source, column, "snapshot store lacks column; ordering by created_at");
            self.metrics.incr(Counter::SchemaFallback);
            outcome = self.latest(key, source, RecencyColumn::CreatedAt).await;
        }

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
                tracing::warn!(key, %source, attempts = outcome.attempts, error = %e, "snapshot read failed; treating as miss");
                None
            }
        }
    }

    /// Upsert a snapshot. Returns whether the write was persisted.
    pub async fn store(&self, write: &SnapshotWrite) -> bool {
        let outcome = with_retry(&self.policy, || {
            let db = self.db.clone();
            let write = write.clone();
            async move { db.upsert_snapshot(&write, Utc::now()).await }
        })
        .await;
        self.record_retries(&outcome);

        match outcome.result {
            Ok(()) => {
                self.metrics.incr(Counter::CacheWrite);
                if !write.analysis.is_unchanged() {
                    self.metrics.incr(Counter::AnalysisUpdate);
                }
                true
            }
            Err(e) => {
                self.metrics.incr(Counter::CacheWriteError);
                tracing::warn!(
                    key = write.key.as_str(),
                    source = %write.source,
                    attempts = outcome.attempts,
                    error = %e,
                    "snapshot write failed"
                );
                false
            }
        }
    }

    /// Physically delete expired snapshots. Returns the number deleted.
    pub async fn purge_expired(&self) -> u64 {
        let outcome = with_retry(&self.policy, || {
            let db = self.db.clone();
            async move { db.purge_expired_snapshots(Utc::now()).await }
        })
        .await;
        self.record_retries(&outcome);

        match outcome.result {
            Ok(deleted) => {
                self.metrics.add(Counter::CleanupDeleted, deleted);
                tracing::info!(deleted, "expired snapshots purged");
                deleted
            }
            Err(e) => {
                self.metrics.incr(Counter::CleanupError);
                tracing::warn!(error = %e, "snapshot purge failed");
                0
            }
        }
    }
}
