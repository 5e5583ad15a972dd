//! Core types and shared functionality for labelgate.
//!
//! This crate provides:
//! - Label draft quality gating and barcode error gating
//! - Ingredient/dosage-form token canonicalization
//! - Result and snapshot caches with SQLite backend
//! - Retry executor for transient store failures
//! - Metrics registry with periodic flush
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod canonical;
pub mod config;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod quality;
pub mod retry;

pub use cache::{CacheDb, CachedResult, ResultCache, SnapshotCache, SnapshotRecord};
pub use config::AppConfig;
pub use error::Error;
pub use metrics::Metrics;
pub use quality::{LabelDraft, QualityVerdict};
pub use retry::{RetryPolicy, RetryableError, with_retry};
